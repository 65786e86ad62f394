use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use remoteproc_core::config::ConfigError;
use remoteproc_core::device::BOOT_DELAY;
use remoteproc_core::{
    DeviceState, NullObserver, Remoteproc, SimEvent, SimObserver, SimulatorConfig,
    SimulatorError,
};
use tempfile::{TempDir, tempdir};

const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<SimEvent>>,
}

impl SimObserver for RecordingObserver {
    fn on_event(&self, event: &SimEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl RecordingObserver {
    fn transitions(&self) -> Vec<(DeviceState, DeviceState)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SimEvent::StateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }
}

struct Sim {
    device: Remoteproc<RecordingObserver>,
    root: TempDir,
}

impl Sim {
    fn start(index: u32, name: &str) -> Self {
        let root = tempdir().unwrap();
        let config = SimulatorConfig {
            root_dir: root.path().to_path_buf(),
            device_index: index,
            device_name: name.to_string(),
            ..Default::default()
        };
        let device =
            Remoteproc::with_observer(config, Arc::new(RecordingObserver::default())).unwrap();
        Self { device, root }
    }

    fn attr(&self, name: &str) -> std::path::PathBuf {
        self.device.device_dir().join(name)
    }

    fn write(&self, name: &str, value: &str) {
        fs::write(self.attr(name), value).unwrap();
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.attr(name)).unwrap()
    }

    fn add_firmware(&self, name: &str) {
        fs::write(self.device.firmware_dir().join(name), "").unwrap();
    }

    fn wait_for_state(&self, want: &str) -> bool {
        wait_for_content(&self.attr("state"), want, WAIT)
    }

    fn transitions(&self) -> Vec<(DeviceState, DeviceState)> {
        self.device.observer().transitions()
    }
}

fn wait_for_content(path: &Path, want: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if fs::read_to_string(path).is_ok_and(|got| got == want) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn bootstrapped_device_is_offline_without_firmware() {
    let sim = Sim::start(1, "fancy-device");

    assert!(sim.device.device_dir().ends_with("class/remoteproc/remoteproc1"));
    assert_eq!(sim.read("state"), "offline");
    assert_eq!(sim.read("firmware"), "");
    assert_eq!(sim.read("name"), "fancy-device");
    assert!(sim.device.firmware_dir().is_dir());
    assert_eq!(fs::read_to_string(sim.device.search_path_file()).unwrap(), "");
}

#[test]
fn start_without_firmware_crashes() {
    let sim = Sim::start(0, "dsp0");
    sim.write("state", "start");

    assert!(sim.wait_for_state("crashed"));
}

#[test]
fn start_with_firmware_runs_after_boot_delay() {
    let sim = Sim::start(0, "dsp0");
    sim.add_firmware("f.bin");
    sim.write("firmware", "f.bin");

    let started = Instant::now();
    sim.write("state", "start");

    assert!(sim.wait_for_state("running"));
    assert!(started.elapsed() >= BOOT_DELAY);
    assert_eq!(
        sim.transitions(),
        vec![(DeviceState::Offline, DeviceState::Running)]
    );
}

#[test]
fn start_with_missing_firmware_stays_offline() {
    let sim = Sim::start(0, "dsp0");
    sim.write("firmware", "missing.bin");
    sim.write("state", "start");

    // The current state is written back over the command.
    assert!(sim.wait_for_state("offline"));
    thread::sleep(BOOT_DELAY * 3);
    assert_eq!(sim.read("state"), "offline");
    assert!(sim.transitions().is_empty());
}

#[test]
fn firmware_found_through_search_path() {
    let sim = Sim::start(0, "dsp0");
    let custom = sim.root.path().join("custom-firmware");
    fs::create_dir(&custom).unwrap();
    fs::write(custom.join("remote.elf"), "").unwrap();
    fs::write(
        sim.device.search_path_file(),
        format!("{}\n", custom.display()),
    )
    .unwrap();

    sim.write("firmware", "remote.elf");
    sim.write("state", "start");

    assert!(sim.wait_for_state("running"));
}

#[test]
fn firmware_change_rejected_while_running() {
    let sim = Sim::start(0, "dsp0");
    sim.add_firmware("a.elf");
    sim.write("firmware", "a.elf");
    sim.write("state", "start");
    assert!(sim.wait_for_state("running"));

    sim.write("firmware", "b.elf");

    assert!(wait_for_content(&sim.attr("firmware"), "a.elf", WAIT));
    assert_eq!(sim.read("state"), "running");
}

#[test]
fn stop_while_offline_is_noop() {
    let sim = Sim::start(0, "dsp0");
    sim.write("state", "stop");

    thread::sleep(BOOT_DELAY * 2);
    // Nothing is written back for a no-op.
    assert_eq!(sim.read("state"), "stop");
    assert!(sim.transitions().is_empty());
}

#[test]
fn stop_while_running_goes_offline() {
    let sim = Sim::start(3, "dsp0");
    sim.add_firmware("some-firmware.elf");
    sim.write("firmware", "some-firmware.elf");
    sim.write("state", "start");
    assert!(sim.wait_for_state("running"));

    sim.write("state", "stop");
    assert!(sim.wait_for_state("offline"));
    assert_eq!(
        sim.transitions(),
        vec![
            (DeviceState::Offline, DeviceState::Running),
            (DeviceState::Running, DeviceState::Offline),
        ]
    );
}

#[test]
fn own_state_writes_do_not_retrigger() {
    let sim = Sim::start(0, "dsp0");
    sim.write("state", "start");
    assert!(sim.wait_for_state("crashed"));

    thread::sleep(BOOT_DELAY * 3);
    assert_eq!(sim.read("state"), "crashed");
    assert_eq!(
        sim.transitions(),
        vec![(DeviceState::Offline, DeviceState::Crashed)]
    );
}

#[test]
fn close_during_boot_prevents_running() {
    let mut sim = Sim::start(0, "dsp0");
    sim.add_firmware("f.bin");
    sim.write("firmware", "f.bin");
    sim.write("state", "start");

    sim.device.close();
    thread::sleep(BOOT_DELAY * 3);

    assert_ne!(sim.read("state"), "running");
    assert!(sim.transitions().is_empty());

    // Idempotent.
    sim.device.close();
}

#[test]
fn null_observer_device_runs() {
    let root = tempdir().unwrap();
    let mut device = Remoteproc::with_observer(
        SimulatorConfig {
            root_dir: root.path().to_path_buf(),
            device_name: "dsp0".into(),
            ..Default::default()
        },
        Arc::new(NullObserver),
    )
    .unwrap();
    let state = device.device_dir().join("state");

    fs::write(&state, "start").unwrap();
    assert!(wait_for_content(&state, "crashed", WAIT));

    device.close();
}

#[test]
fn devices_are_independent() {
    let root = tempdir().unwrap();
    let config = |index: u32, name: &str| SimulatorConfig {
        root_dir: root.path().to_path_buf(),
        device_index: index,
        device_name: name.to_string(),
        ..Default::default()
    };
    let first = Remoteproc::new(config(0, "dsp0")).unwrap();
    let second = Remoteproc::new(config(1, "dsp1")).unwrap();

    fs::write(first.device_dir().join("state"), "start").unwrap();
    assert!(wait_for_content(
        &first.device_dir().join("state"),
        "crashed",
        WAIT
    ));
    assert_eq!(
        fs::read_to_string(second.device_dir().join("state")).unwrap(),
        "offline"
    );
    assert_eq!(
        fs::read_to_string(second.device_dir().join("name")).unwrap(),
        "dsp1"
    );
}

#[test]
fn cleanup_on_exit_removes_created_tree() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("fake-root");
    let mut device = Remoteproc::new(SimulatorConfig {
        root_dir: root.clone(),
        device_name: "dsp0".into(),
        cleanup_on_exit: true,
        ..Default::default()
    })
    .unwrap();
    assert!(root.is_dir());

    device.close();
    assert!(!root.exists());
}

#[test]
fn invalid_config_is_rejected() {
    let missing_root = Remoteproc::new(SimulatorConfig {
        device_name: "dsp0".into(),
        ..Default::default()
    });
    assert!(matches!(
        missing_root,
        Err(SimulatorError::Config(ConfigError::MissingRootDir))
    ));

    let missing_name = Remoteproc::new(SimulatorConfig {
        root_dir: "some/dir".into(),
        ..Default::default()
    });
    assert!(matches!(
        missing_name,
        Err(SimulatorError::Config(ConfigError::MissingDeviceName))
    ));
}

#[test]
fn unwritable_root_fails_bootstrap() {
    let tmp = tempdir().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();

    let result = Remoteproc::new(SimulatorConfig {
        root_dir: blocker,
        device_name: "dsp0".into(),
        ..Default::default()
    });
    assert!(matches!(result, Err(SimulatorError::Bootstrap(_))));
}

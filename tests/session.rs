use std::io::Cursor;
use std::net::Ipv4Addr;
use std::path::Path;

use routerman::manager::SlotRequest;
use routerman::router::{ClientReservation, ClientStat, RouterState, SnapshotRouter};
use routerman::storage::{DeviceStorage, JsonStore, SlotStorage, UserStorage};
use routerman::{BoundPolicy, Error, LineConsole, MacAddr, Manager, Session, SessionSettings};

type TestSession = Session<SnapshotRouter, JsonStore>;

const PHONE: &str = "F2:28:A9:A4:75:6C";

fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 0, last)
}

fn settings(dir: &Path) -> SessionSettings {
    SessionSettings {
        page_size: 5,
        bound_policy: BoundPolicy::Subnet,
        export_dir: dir.to_path_buf(),
    }
}

fn manager(dir: &Path, state: RouterState) -> Manager<SnapshotRouter, JsonStore> {
    let store = JsonStore::init(dir.join("routerman.json")).unwrap();
    Manager::new(SnapshotRouter::in_memory(state), store)
}

/// ann owns 192.168.0.16-18 with a phone on .16.
fn populated(dir: &Path, state: RouterState) -> TestSession {
    let mut manager = manager(dir, state);
    let user = manager.register_user("ann").unwrap();
    let slot = manager.available_slots(BoundPolicy::Subnet).unwrap()[0];
    let request = SlotRequest {
        start: Some(ip(16)),
        devices: 3,
        max_up_kbps: 1000,
        max_down_kbps: 1000,
    };
    let stored = manager.assign_slot(user.id, &slot, &request).unwrap();
    manager
        .register_device(user.id, stored.id, PHONE.parse().unwrap(), "phone")
        .unwrap();
    Session::new(manager, settings(dir))
}

fn drive(session: &mut TestSession, script: &[&str]) -> (routerman::Result<()>, String) {
    let input = script.join("\n") + "\n";
    let mut console = LineConsole::new(Cursor::new(input.into_bytes()), Vec::new());
    let result = session.run(&mut console);
    (result, String::from_utf8(console.into_output()).unwrap())
}

#[test]
fn test_register_assign_and_add_device() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(manager(dir.path(), RouterState::default()), settings(dir.path()));

    let (result, out) = drive(
        &mut session,
        &[
            "1", // Manage users
            "1", // Register a user
            "ann",
            "2", // List users
            "1", // ann
            "2", // Assign bandwidth slot
            "1", // the only free slot
            "3",
            "192.168.0.16",
            "",
            "",
            "1", // List user bandwidth slots
            "1",
            "1", // Register a device
            "zz",
            "f2:28:a9:a4:75:6c",
            "phone",
            "q",
        ],
    );
    result.unwrap();

    assert!(out.contains("1: Manage users\n2: Manage devices\n3: Manage internet access\nQ: Quit\n"));
    assert!(out.contains("1. 192.168.0.2 - 192.168.0.254 [253]"));
    assert!(out.contains("1. 192.168.0.16 - 192.168.0.18 (down 1000 / up 1000 kbps)"));
    assert!(out.contains("invalid mac address 'zz', try again"));
    assert!(out.contains(&format!("Reserved 192.168.0.16 for {PHONE}")));

    let router = session.manager().router().state();
    assert_eq!(router.bandwidth.entries.len(), 1);
    let entry = &router.bandwidth.entries[0];
    assert_eq!((entry.start_ip, entry.end_ip), (ip(16), ip(18)));
    assert_eq!(router.reservations[0].ip, ip(16));

    // everything the session stored is on disk
    let store = JsonStore::open(dir.path().join("routerman.json")).unwrap();
    let users = store.read_users(5, 1).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "ann");
    let slots = store.read_slots_by_user(users[0].id, 5, 1).unwrap();
    assert_eq!(slots[0].remote_id, entry.id);
    let devices = store.read_devices_by_user(users[0].id, 5, 1).unwrap();
    assert_eq!(devices[0].alias, "phone");
    assert_eq!(devices[0].mac.to_string(), PHONE);
}

#[test]
fn test_deregister_user_returns_to_user_menu() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = populated(dir.path(), RouterState::default());

    let (result, out) = drive(&mut session, &["1", "2", "1", "4", "q"]);
    result.unwrap();

    assert!(out.contains("Deregistered user 'ann'"));
    // after deregistering, the user menu is shown again
    let tail = out.split("Deregistered user 'ann'").nth(1).unwrap();
    assert!(tail.contains("1: Register a user\n2: List users\n"));

    let router = session.manager().router().state();
    assert!(router.bandwidth.entries.is_empty());
    assert!(router.reservations.is_empty());
    let store = session.manager().store();
    assert!(store.read_users(5, 1).unwrap().is_empty());
    assert!(store.read_devices(5, 1).unwrap().is_empty());
    assert!(store.read_slots(5, 1).unwrap().is_empty());
}

#[test]
fn test_block_device_and_list_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = populated(dir.path(), RouterState::default());

    let (result, out) = drive(
        &mut session,
        &["2", "1", "1", "2", "b", "b", "3", "1", "q"],
    );
    result.unwrap();

    assert!(out.contains(&format!("1. phone ({PHONE})")));
    assert!(out.contains("Blocked device 'phone'"));
    let table = out.split("Blocked device 'phone'").nth(1).unwrap();
    assert!(table.contains("Owner"));
    assert!(table.contains("ann"));

    let access = &session.manager().router().state().access_control;
    assert!(access.enabled);
    assert_eq!(access.rules.len(), 1);
}

#[test]
fn test_registering_reserved_mac_redraws_slot_menu() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = populated(dir.path(), RouterState::default());

    let (result, out) = drive(
        &mut session,
        &["1", "2", "1", "1", "1", "1", PHONE, "again", "q"],
    );
    result.unwrap();

    let message = format!("mac address '{PHONE}' already has a reservation for 192.168.0.16");
    assert!(out.contains(&message));
    let tail = out.split(message.as_str()).nth(1).unwrap();
    assert!(tail.contains("1: Register a device\n"));
    assert_eq!(session.manager().router().state().reservations.len(), 1);
}

#[test]
fn test_unblock_without_rule_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = populated(dir.path(), RouterState::default());

    let (result, out) = drive(&mut session, &["2", "1", "1", "3", "q"]);
    result.unwrap();
    assert!(out.contains(&format!("host with mac '{PHONE}' not found")));
}

#[test]
fn test_connected_devices_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let known: MacAddr = PHONE.parse().unwrap();
    let stranger: MacAddr = "00:11:22:33:44:55".parse().unwrap();
    let mut state = RouterState::default();
    state.bindings = vec![
        ClientReservation {
            id: 90,
            mac: stranger,
            ip: ip(50),
            enabled: false,
        },
        ClientReservation {
            id: 91,
            mac: known,
            ip: ip(7),
            enabled: true,
        },
    ];
    state.statistics = vec![ClientStat {
        ip: ip(50),
        mac: stranger,
        bytes_in: 1,
        bytes_out: 2,
    }];
    let mut session = Session::new(manager(dir.path(), state), settings(dir.path()));

    let (result, out) = drive(&mut session, &["2", "2", "q", "3", "4", "q"]);
    result.unwrap();

    assert!(out.contains("1. 192.168.0.50     00:11:22:33:44:55  Unknown  Unknown"));
    assert!(out.contains("\nScroll with n(ext)/p(revious)/q(uit): "));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("bindings.csv")).unwrap(),
        format!("Mac,IP,Enabled\n{PHONE},192.168.0.7,y\n00:11:22:33:44:55,192.168.0.50,n\n")
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("reservations.csv")).unwrap(),
        "Mac,IP,Enabled\n"
    );
}

#[test]
fn test_operator_mistakes_redraw_the_menu() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager(dir.path(), RouterState::default());
    manager.register_user("ann").unwrap();
    let mut session = Session::new(manager, settings(dir.path()));

    let (result, out) = drive(
        &mut session,
        &[
            "0",
            "1",
            "2",
            "1",
            // not a number
            "2",
            "1",
            "abc",
            // start below the slot
            "2",
            "1",
            "1",
            "192.168.0.1",
            "",
            "",
            // not an address
            "2",
            "1",
            "1",
            "300.1.1.1",
            "q",
        ],
    );
    result.unwrap();

    assert!(out.contains("invalid choice, try again"));
    assert!(out.contains("invalid input\n"));
    assert!(out.contains("Given start IP is below range"));
    assert!(out.contains("invalid IPv4 address '300.1.1.1'"));
    assert!(session.manager().router().state().bandwidth.entries.is_empty());
}

#[test]
fn test_closed_input_ends_session_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(manager(dir.path(), RouterState::default()), settings(dir.path()));
    let (result, _) = drive(&mut session, &["1"]);
    assert!(matches!(result, Err(Error::InputClosed)));
}

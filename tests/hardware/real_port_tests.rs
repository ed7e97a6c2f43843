//! Tests requiring actual serial hardware.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0          # or COM3 on Windows
//! cargo test --test integration_hardware -- --ignored
//! ```
//!
//! Without `TEST_PORT` the first USB serial adapter found in `/dev` (or the
//! last of COM1..COM9 that opens) is used.

use super::utils::{is_posix, skip_without_hardware, PortTestFixture};
use serde_json::{json, Map, Value};
use serial_device::port::{
    DataBits, ErrorKind, FlowControl, ModemParams, Parity, SerialPort, StopBits,
};

fn sample_params() -> ModemParams {
    ModemParams {
        baud: 19200,
        data_bits: DataBits::Seven,
        stop_bits: StopBits::Two,
        parity: Parity::Even,
        flow_control: FlowControl::SOFT,
        read_timeout: 100,
    }
}

fn sample_map() -> Map<String, Value> {
    match json!({
        "baud": 19200,
        "data_bits": 7,
        "stop_bits": 2,
        "parity": 1,
        "flow_control": 2,
        "read_timeout": 100,
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[test]
#[ignore]
fn test_default_open() {
    let err = SerialPort::open("").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let device = match skip_without_hardware() {
        Some(d) => d,
        None => return,
    };
    let mut port = PortTestFixture::try_open(&device, &ModemParams::default()).unwrap();
    assert_eq!(port.name(), device);
    assert!(port.is_open());
    port.close();
    assert!(!port.is_open());
}

#[test]
#[ignore]
fn test_params_map_has_all_keys() {
    let Some(fixture) = PortTestFixture::setup() else {
        return;
    };
    let params = fixture.modem_params_map().unwrap();
    for key in [
        "baud",
        "data_bits",
        "stop_bits",
        "parity",
        "flow_control",
        "read_timeout",
    ] {
        assert!(params.contains_key(key), "missing {key}");
    }
}

#[test]
#[ignore]
fn test_open_with_map() {
    let Some(device) = skip_without_hardware() else {
        return;
    };
    let expected = sample_map();
    let port = SerialPort::open_with_map(&device, &expected).unwrap();
    assert_eq!(port.modem_params_map().unwrap(), expected);
}

#[test]
#[ignore]
fn test_scoped_open() {
    let Some(device) = skip_without_hardware() else {
        return;
    };
    let baud = SerialPort::with_open(&device, &ModemParams::default(), |port| port.baud()).unwrap();
    assert_eq!(baud, 9600);
}

#[test]
#[ignore]
fn test_standard_baud() {
    let params = ModemParams {
        baud: 19200,
        ..ModemParams::default()
    };
    let Some(mut fixture) = PortTestFixture::setup_with(&params) else {
        return;
    };
    assert_eq!(fixture.baud().unwrap(), 19200);
    fixture.set_baud(38400).unwrap();
    assert_eq!(fixture.baud().unwrap(), 38400);
}

#[test]
#[ignore]
fn test_custom_baud() {
    let params = sample_params();
    let Some(mut fixture) = PortTestFixture::setup_with(&params) else {
        return;
    };

    match fixture.set_baud(15625) {
        Ok(()) => assert_eq!(fixture.baud().unwrap(), 15625),
        // Drivers without arbitrary rates must refuse rather than round.
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::InvalidArgument);
            assert_eq!(fixture.baud().unwrap(), 19200);
        }
    }

    let actual = fixture.modem_params().unwrap();
    assert_eq!(actual.data_bits, params.data_bits);
    assert_eq!(actual.stop_bits, params.stop_bits);
    assert_eq!(actual.parity, params.parity);
    assert_eq!(actual.flow_control, params.flow_control);
    assert_eq!(actual.read_timeout, params.read_timeout);
}

#[test]
#[ignore]
fn test_invalid_baud() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    let initial = fixture.baud().unwrap();
    for bad in [json!(0), json!(100_000_000)] {
        let err = fixture.set_param("baud", &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert_eq!(fixture.baud().unwrap(), initial);
}

#[test]
#[ignore]
fn test_data_bits() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    fixture.data_bits().unwrap();
    fixture.set_data_bits(DataBits::Seven).unwrap();
    assert_eq!(fixture.data_bits().unwrap(), DataBits::Seven);

    for bad in [json!(0), json!(9)] {
        let err = fixture.set_param("data_bits", &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert_eq!(fixture.data_bits().unwrap(), DataBits::Seven);
}

#[test]
#[ignore]
fn test_flow_control() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    fixture.flow_control().unwrap();

    let mut modes = vec![FlowControl::NONE, FlowControl::SOFT, FlowControl::HARD];
    if is_posix() {
        modes.push(FlowControl::SOFT | FlowControl::HARD);
    }
    modes.push(FlowControl::NONE);
    for mode in modes {
        fixture.set_flow_control(mode).unwrap();
        assert_eq!(fixture.flow_control().unwrap(), mode);
    }

    let err = fixture.set_param("flow_control", &json!(-1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(fixture.flow_control().unwrap(), FlowControl::NONE);
}

#[test]
#[ignore]
fn test_modem_params() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    let params = sample_map();
    fixture.set_modem_params_map(&params).unwrap();
    assert_eq!(fixture.modem_params_map().unwrap(), params);
}

#[test]
#[ignore]
fn test_parity() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    for parity in [Parity::None, Parity::Even, Parity::Odd, Parity::None] {
        fixture.set_parity(parity).unwrap();
        assert_eq!(fixture.parity().unwrap(), parity);
    }

    for bad in [json!(-1), json!(100)] {
        let err = fixture.set_param("parity", &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    let err = fixture.set_param("parity", &json!("not a number")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(fixture.parity().unwrap(), Parity::None);
}

#[test]
#[ignore]
fn test_read_timeout() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    for millis in [0, 100, -1, 0] {
        fixture.set_read_timeout(millis).unwrap();
        assert_eq!(fixture.read_timeout().unwrap(), millis);
    }
    let err = fixture
        .set_param("read_timeout", &json!("not a number"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
#[ignore]
fn test_stop_bits() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    for bits in [StopBits::One, StopBits::Two, StopBits::One] {
        fixture.set_stop_bits(bits).unwrap();
        assert_eq!(fixture.stop_bits().unwrap(), bits);
    }

    for bad in [json!(0), json!(3)] {
        let err = fixture.set_param("stop_bits", &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    let err = fixture
        .set_param("stop_bits", &json!("not a number"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(fixture.stop_bits().unwrap(), StopBits::One);
}

#[test]
#[ignore]
fn test_signals() {
    let Some(mut fixture) = PortTestFixture::setup() else {
        return;
    };
    let readable = fixture.capabilities();

    for value in [
        fixture.cts().unwrap(),
        fixture.dcd().unwrap(),
        fixture.dsr().unwrap(),
        fixture.ri().unwrap(),
    ] {
        assert!(value <= 1);
    }

    fixture.set_dtr(false).unwrap();
    if readable.read_dtr {
        assert_eq!(fixture.dtr().unwrap(), 0);
    }
    fixture.set_dtr(true).unwrap();
    if readable.read_dtr {
        assert_eq!(fixture.dtr().unwrap(), 1);
    }

    fixture.set_rts(false).unwrap();
    if readable.read_rts {
        assert_eq!(fixture.rts().unwrap(), 0);
    }
    fixture.set_rts(true).unwrap();
    if readable.read_rts {
        assert_eq!(fixture.rts().unwrap(), 1);
    }

    let signals = fixture.signals().unwrap();
    assert_eq!(signals.cts, fixture.cts().unwrap());
    assert_eq!(signals.dcd, fixture.dcd().unwrap());
    assert_eq!(signals.dsr, fixture.dsr().unwrap());
    assert_eq!(signals.ri, fixture.ri().unwrap());
    if readable.read_dtr {
        assert_eq!(signals.dtr, fixture.dtr().unwrap());
    }
    if readable.read_rts {
        assert_eq!(signals.rts, fixture.rts().unwrap());
    }
}

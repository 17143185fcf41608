//! End-to-end behaviour of the gaussmeter adapter against the mock transport.

use hgm_daq::adapters::{Framing, MockAdapter, MockReply, Transport};
use hgm_daq::config::ConnectionConfig;
use hgm_daq::protocol::{HgmCodec, SerialProbeCodec};
use hgm_daq::{AdapterState, DaqError, Gaussmeter, Mode, ProtocolError, Unit};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(100);

fn hgm_mock() -> MockAdapter {
    MockAdapter::new().on("*IDN?", "MAGSYS HGM09s V2.1\n\r")
}

fn hgm_meter(mock: &MockAdapter) -> Gaussmeter {
    let connection = ConnectionConfig::new("ASRL/dev/ttyUSB0::INSTR", 9600, TIMEOUT).unwrap();
    Gaussmeter::new(connection, Box::new(mock.clone()), Arc::new(HgmCodec))
}

async fn ready_meter(mock: &MockAdapter) -> Gaussmeter {
    let meter = hgm_meter(mock);
    meter.connect().await.unwrap();
    mock.clear_log();
    meter
}

#[tokio::test]
async fn read_field_decodes_reply() {
    let mock = hgm_mock().on(":MEAS?", "1.23456\r\n");
    let meter = ready_meter(&mock).await;

    let measurement = meter.read_field().await.unwrap();
    assert_eq!(measurement.value, 1.23456);
    assert_eq!(measurement.formatted(), "1.23456");
    assert_eq!(mock.frames(), vec![":MEAS?".to_string()]);
}

#[tokio::test]
async fn read_field_accepts_exponent_form() {
    let mock = hgm_mock().on(":MEAS?", "-4.5e-3\n\r");
    let meter = ready_meter(&mock).await;
    assert_eq!(meter.read_field().await.unwrap().value, -4.5e-3);
}

#[tokio::test]
async fn garbage_reply_is_parse_error_and_adapter_stays_ready() {
    let mock = hgm_mock().on(":MEAS?", "garbage\n\r");
    let meter = ready_meter(&mock).await;

    let err = meter.read_field().await.unwrap_err();
    assert!(err.is_parse());
    assert!(matches!(
        err,
        DaqError::Device(ProtocolError::Parse { .. })
    ));
    assert_eq!(meter.state(), AdapterState::Ready);
}

#[tokio::test]
async fn silent_instrument_times_out_without_retry() {
    let mock = hgm_mock();
    let meter = ready_meter(&mock).await;

    let err = meter.read_range().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(mock.frames(), vec![":RANG?".to_string()]);
    assert_eq!(meter.state(), AdapterState::Ready);
}

#[tokio::test]
async fn read_settings_decode_by_name_or_ordinal() {
    let mock = hgm_mock()
        .on(":UNIT?", "APM\n\r")
        .on(":RANG?", "2\n\r")
        .on(":MODE?", "1\n\r");
    let meter = ready_meter(&mock).await;

    assert_eq!(meter.read_unit().await.unwrap(), Unit::AmpPerMeter);
    assert_eq!(meter.read_range().await.unwrap().code(), 2);
    assert_eq!(meter.read_mode().await.unwrap(), Mode::Ac);
}

#[tokio::test]
async fn out_of_range_reply_is_rejected() {
    let mock = hgm_mock().on(":RANG?", "7\n\r");
    let meter = ready_meter(&mock).await;
    assert!(meter.read_range().await.unwrap_err().is_parse());
}

#[tokio::test]
async fn set_unit_writes_parameter_then_save() {
    let mock = hgm_mock();
    let meter = ready_meter(&mock).await;

    meter.set_unit(Unit::Gauss).await.unwrap();
    assert_eq!(
        mock.frames(),
        vec![":PAR:UNIT GAUS".to_string(), ":PAR:SAVE".to_string()]
    );
}

#[tokio::test]
async fn set_range_writes_parameter_then_save() {
    let mock = hgm_mock();
    let meter = ready_meter(&mock).await;

    for code in 0..=3 {
        mock.clear_log();
        meter.set_range(code).await.unwrap();
        assert_eq!(
            mock.frames(),
            vec![format!(":PAR:RANG {}", code), ":PAR:SAVE".to_string()],
            "code {}",
            code
        );
    }
}

#[tokio::test]
async fn invalid_range_is_rejected_before_any_io() {
    let mock = hgm_mock();
    let meter = ready_meter(&mock).await;

    for code in [-1, 4, 7, i64::MAX] {
        let err = meter.set_range(code).await.unwrap_err();
        assert!(matches!(err, DaqError::Validation(_)), "code {}", code);
    }
    assert!(mock.call_log().is_empty());
}

#[tokio::test]
async fn failed_save_frame_is_device_error_without_rollback() {
    let mock = hgm_mock();
    let meter = ready_meter(&mock).await;
    mock.fail_write_on(":PAR:SAVE");

    let err = meter.set_mode(Mode::Ac).await.unwrap_err();
    assert!(matches!(err, DaqError::Device(ProtocolError::Io(_))));
    assert_eq!(mock.frames(), vec![":PAR:ACDC AC".to_string()]);
    assert_eq!(meter.state(), AdapterState::Ready);
}

#[tokio::test]
async fn late_reply_is_flushed_before_next_exchange() {
    let mock = hgm_mock()
        .on_once(":MEAS?", MockReply::Late("9.99999\n\r".to_string()))
        .on(":MEAS?", "1.00000\n\r");
    let meter = ready_meter(&mock).await;

    assert!(meter.read_field().await.unwrap_err().is_timeout());
    let measurement = meter.read_field().await.unwrap();
    assert_eq!(measurement.value, 1.0);
    assert_eq!(mock.flush_count(), 1);
}

#[tokio::test]
async fn unreachable_transport_faults_connect() {
    let mock = MockAdapter::new().unreachable();
    let meter = hgm_meter(&mock);

    let err = meter.connect().await.unwrap_err();
    assert!(matches!(err, DaqError::Connection(_)));
    assert_eq!(meter.state(), AdapterState::Faulted);
    assert!(matches!(
        meter.read_field().await,
        Err(DaqError::NotReady(AdapterState::Faulted))
    ));
}

#[tokio::test]
async fn faulted_adapter_reconnects_explicitly() {
    let mock = MockAdapter::new()
        .on_once("*IDN?", MockReply::Silent)
        .on("*IDN?", "HGM09s\n\r");
    let meter = hgm_meter(&mock);

    assert!(meter.connect().await.is_err());
    assert_eq!(meter.state(), AdapterState::Faulted);

    meter.connect().await.unwrap();
    assert_eq!(meter.state(), AdapterState::Ready);
    assert_eq!(mock.open_count(), 2);
}

#[tokio::test]
async fn state_subscribers_observe_lifecycle() {
    let mock = hgm_mock();
    let meter = hgm_meter(&mock);
    let mut states = meter.subscribe_state();

    meter.connect().await.unwrap();
    assert_eq!(*states.borrow_and_update(), AdapterState::Ready);

    meter.disconnect().await;
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), AdapterState::Disconnected);
}

#[tokio::test]
async fn disconnect_releases_handle_exactly_once() {
    let mock = hgm_mock();
    let meter = ready_meter(&mock).await;

    meter.disconnect().await;
    meter.disconnect().await;
    assert_eq!(meter.state(), AdapterState::Disconnected);
    assert!(!mock.is_open());
    assert!(matches!(
        meter.read_field().await,
        Err(DaqError::NotReady(AdapterState::Disconnected))
    ));

    drop(meter);
    assert_eq!(mock.release_count(), 1);
}

#[tokio::test]
async fn dropping_ready_adapter_releases_handle() {
    let mock = hgm_mock();
    let meter = ready_meter(&mock).await;
    drop(meter);
    assert!(!mock.is_open());
    assert_eq!(mock.release_count(), 1);
}

#[tokio::test]
async fn serial_probe_only_measures_field() {
    let mock = MockAdapter::new()
        .with_framing(Framing::for_codec(&SerialProbeCodec))
        .on(":MEAS?", "123.456\n");
    let connection = ConnectionConfig::new("/dev/ttyGaussmeter", 9600, TIMEOUT).unwrap();
    let meter = Gaussmeter::new(connection, Box::new(mock.clone()), Arc::new(SerialProbeCodec));

    meter.connect().await.unwrap();
    let measurement = meter.read_field().await.unwrap();
    assert_eq!(measurement.value, 123.456);
    assert_eq!(measurement.to_string(), "123.45600 mT");

    assert!(matches!(meter.read_unit().await, Err(DaqError::Unsupported(_))));
    assert!(matches!(meter.set_range(1).await, Err(DaqError::Unsupported(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_never_interleave_exchanges() {
    let mock = hgm_mock()
        .with_latency(Duration::from_millis(2))
        .on(":MEAS?", "0.5\n\r")
        .on(":MODE?", "DC\n\r");
    let meter = Arc::new(ready_meter(&mock).await);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let meter = Arc::clone(&meter);
        tasks.push(tokio::spawn(async move {
            if i % 3 == 0 {
                meter.set_range(1).await.map(|_| ())
            } else if i % 2 == 0 {
                meter.read_mode().await.map(|_| ())
            } else {
                meter.read_field().await.map(|_| ())
            }
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Every query is immediately followed by its read; every parameter write by its save
    let log = mock.call_log();
    let mut entries = log.iter();
    while let Some(entry) = entries.next() {
        match entry.as_str() {
            "write :MEAS?" | "write :MODE?" => assert_eq!(entries.next().map(String::as_str), Some("read")),
            "write :PAR:RANG 1" => {
                assert_eq!(entries.next().map(String::as_str), Some("write :PAR:SAVE"))
            }
            other => panic!("unexpected transport call {}", other),
        }
    }
}

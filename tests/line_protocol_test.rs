//! Integration tests for the TCP line-protocol client against loopback fake instruments

mod common;

use common::{FakeInstrument, Reply};
use lab_gateway::error::{AcquisitionError, ErrorKind};
use lab_gateway::instrument::{Instrument, InstrumentEndpoint, LineProtocolClient};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_sends_crlf_terminated_command() {
    let fake = FakeInstrument::spawn(Reply::text("1.3330\r\n")).await;
    let client = LineProtocolClient::new(fake.endpoint(Instrument::Refractometer));

    let raw = client.query().await.unwrap();

    assert_eq!(raw.text, "1.3330");
    assert_eq!(fake.received(), vec!["R\r\n".to_string()]);
}

#[tokio::test]
async fn test_custom_command() {
    let fake = FakeInstrument::spawn(Reply::text("2.5")).await;
    let client =
        LineProtocolClient::new(fake.endpoint(Instrument::Refractometer).with_command("READ"));

    client.read().await.unwrap();

    assert_eq!(fake.received(), vec!["READ\r\n".to_string()]);
}

#[tokio::test]
async fn test_refractometer_reading() {
    let fake = FakeInstrument::spawn(Reply::text("1.3330 nD\r\n")).await;
    let client = LineProtocolClient::new(fake.endpoint(Instrument::Refractometer));

    let reading = client.read().await.unwrap();

    assert_eq!(reading.value(), 1.333);
    assert_eq!(reading.unit(), None);
}

#[tokio::test]
async fn test_polarimeter_takes_third_field_of_first_line() {
    let fake = FakeInstrument::spawn(Reply::text("12/10/2026,10:31,-12.875,OR\r\nEND\r\n")).await;
    let client = LineProtocolClient::new(fake.endpoint(Instrument::Polarimeter));

    assert_eq!(client.read().await.unwrap().value(), -12.875);
}

#[tokio::test]
async fn test_cancelled_reading() {
    let fake = FakeInstrument::spawn(Reply::text("Measurement Cancelled\r\n")).await;
    let client = LineProtocolClient::new(fake.endpoint(Instrument::Polarimeter));

    assert_eq!(
        client.read().await.unwrap_err(),
        AcquisitionError::CancelledByUser
    );
}

#[tokio::test]
async fn test_garbage_is_parse_error() {
    let fake = FakeInstrument::spawn(Reply::text("ERR\r\n")).await;
    let client = LineProtocolClient::new(fake.endpoint(Instrument::Refractometer));

    assert_eq!(
        client.read().await.unwrap_err(),
        AcquisitionError::ParseError("ERR".to_string())
    );
}

#[tokio::test]
async fn test_silent_instrument_times_out() {
    let fake = FakeInstrument::spawn(Reply::Silent).await;
    let endpoint = fake
        .endpoint(Instrument::Refractometer)
        .with_timeout(Duration::from_millis(150));
    let client = LineProtocolClient::new(endpoint);

    let started = Instant::now();
    let err = client.read().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_queued_query_shares_the_deadline() {
    let fake = FakeInstrument::spawn(Reply::Silent).await;
    let timeout = Duration::from_millis(300);
    let client =
        LineProtocolClient::new(fake.endpoint(Instrument::Polarimeter).with_timeout(timeout));

    let started = Instant::now();
    let (first, second) = tokio::join!(client.read(), client.read());

    assert_eq!(first.unwrap_err().kind(), ErrorKind::Timeout);
    assert_eq!(second.unwrap_err().kind(), ErrorKind::Timeout);
    // Waiting behind the first exchange counts against the second one's deadline.
    assert!(started.elapsed() < timeout * 2, "{:?}", started.elapsed());
}

#[tokio::test]
async fn test_connection_refused() {
    let port = common::closed_port().await;
    let endpoint = InstrumentEndpoint::new(
        "refractometro",
        "127.0.0.1",
        port,
        Instrument::Refractometer.response_format(),
    )
    .with_timeout(common::TCP_TIMEOUT);
    let client = LineProtocolClient::new(endpoint);

    let err = client.read().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.to_string().contains("Failed to connect"), "{}", err);
}

#[tokio::test]
async fn test_close_without_response_is_connection_error() {
    let fake = FakeInstrument::spawn(Reply::Close).await;
    let client = LineProtocolClient::new(fake.endpoint(Instrument::Polarimeter));

    let err = client.read().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_each_query_uses_a_fresh_connection() {
    let fake = FakeInstrument::spawn(Reply::text("1.5")).await;
    let client = LineProtocolClient::new(fake.endpoint(Instrument::Refractometer));

    client.read().await.unwrap();
    client.read().await.unwrap();

    assert_eq!(fake.received().len(), 2);
}

use super::error::BridgeError;
use super::logging;
use crate::client::ClientError;
use std::time::Duration;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("verbose");
    logging::init("warn");
}

#[test]
fn verbose_flag_selects_debug() {
    assert_eq!(logging::level_for(true), "debug");
    assert_eq!(logging::level_for(false), "info");
}

#[test]
fn only_malformed_requests_are_client_errors() {
    assert!(BridgeError::MalformedRequest("topic is empty".into()).is_client_error());
    assert!(!BridgeError::SendRejected("nope".into()).is_client_error());
    assert!(!BridgeError::TransientBrokerUnavailable("down".into()).is_client_error());
    assert!(!BridgeError::ProducerInitializationFailure("bad auth".into()).is_client_error());
}

#[test]
fn client_errors_map_onto_taxonomy() {
    assert!(matches!(
        BridgeError::from(ClientError::Disconnected),
        BridgeError::TransientBrokerUnavailable(_)
    ));
    assert!(matches!(
        BridgeError::from(ClientError::Timeout(Duration::from_millis(10))),
        BridgeError::SendRejected(_)
    ));
    assert!(matches!(
        BridgeError::from(ClientError::Rejected("quota".into())),
        BridgeError::SendRejected(_)
    ));
}

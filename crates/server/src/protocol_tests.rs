// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn requests_use_stable_op_tags() {
    let req = Request::AcquireLock {
        name: "db".to_string(),
        caller: CallerId::new("w1"),
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["op"], "acquire_lock");
    assert_eq!(json["name"], "db");
    assert_eq!(json["caller"], "w1");
}

#[test]
fn acquire_value_set_tag_is_optional_on_the_wire() {
    let req: Request =
        serde_json::from_str(r#"{"op":"acquire_value_set","caller":"w1"}"#).unwrap();
    assert_eq!(
        req,
        Request::AcquireValueSet {
            tag: None,
            caller: CallerId::new("w1"),
        }
    );

    let req: Request =
        serde_json::from_str(r#"{"op":"acquire_value_set","tag":"admin","caller":"w1"}"#).unwrap();
    assert!(matches!(req, Request::AcquireValueSet { tag: Some(t), .. } if t == "admin"));
}

#[test]
fn responses_use_stable_status_tags() {
    assert_eq!(
        serde_json::to_string(&Response::Ok).unwrap(),
        r#"{"status":"ok"}"#
    );
    assert_eq!(
        serde_json::to_string(&Response::Retry).unwrap(),
        r#"{"status":"retry"}"#
    );
    let err = Response::error(ErrorKind::NoSuchTag, "no set tagged admin");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["kind"], "no_such_tag");
}

#[test]
fn caller_is_extracted_when_present() {
    let req = Request::Ping {
        caller: CallerId::new("w9"),
    };
    assert_eq!(req.caller().map(CallerId::as_str), Some("w9"));

    let req = Request::GetParallelValue {
        key: "k".to_string(),
    };
    assert!(req.caller().is_none());
}

#[test]
fn request_round_trip() {
    let req = Request::AddValueToSet {
        name: "server1".to_string(),
        values: [
            ("tags".to_string(), "admin,eu".to_string()),
            ("HOST".to_string(), "h1".to_string()),
        ]
        .into_iter()
        .collect(),
    };
    let json = serde_json::to_string(&req).unwrap();
    let back: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(req, back);
}

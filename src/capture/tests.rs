use super::*;

#[test]
fn commands_serialize_as_lines() {
    assert_eq!(
        CaptureCommand::Start.to_line().expect("encodes"),
        "{\"cmd\":\"START\"}\n"
    );
    assert_eq!(
        CaptureCommand::Stop.to_line().expect("encodes"),
        "{\"cmd\":\"STOP\"}\n"
    );

    let capture = CaptureCommand::Capture {
        hn: Some("C-001".to_string()),
        mode: Some(PersonKind::Child),
    };
    let json: serde_json::Value =
        serde_json::from_str(&capture.to_line().expect("encodes")).expect("valid json");
    assert_eq!(json["cmd"], "CAPTURE");
    assert_eq!(json["hn"], "C-001");
    assert_eq!(json["mode"], "child");
}

#[test]
fn bare_capture_command_parses() {
    let command: CaptureCommand =
        serde_json::from_str(r#"{"cmd":"CAPTURE"}"#).expect("parses");
    assert_eq!(command, CaptureCommand::Capture { hn: None, mode: None });
}

#[test]
fn parses_process_events() {
    assert_eq!(parse_line(r#"{"status": "ready"}"#), Some(CaptureEvent::Ready));
    assert_eq!(
        parse_line(r#"{"running": false}"#),
        Some(CaptureEvent::Status { running: false })
    );
    assert_eq!(
        parse_line(r#"{"info": "Processing 3D data..."}"#),
        Some(CaptureEvent::Info("Processing 3D data...".to_string()))
    );
    assert_eq!(
        parse_line(r#"{"distance": 0.412, "image": "aGVsbG8="}"#),
        Some(CaptureEvent::Preview {
            distance: 0.412,
            image: "aGVsbG8=".to_string()
        })
    );
    assert_eq!(
        parse_line(r#"{"error": "No device connected"}"#),
        Some(CaptureEvent::Error("No device connected".to_string()))
    );
}

#[test]
fn saved_event_accepts_path_or_folder() {
    assert_eq!(
        parse_line(r#"{"event": "saved", "path": "captures/ear_001.ply"}"#),
        Some(CaptureEvent::Saved {
            folder: "captures/ear_001.ply".to_string(),
            embedding: None
        })
    );
    assert_eq!(
        parse_line(r#"{"event": "saved", "folder": "captures/C-001", "embedding": [0.5, 0.5]}"#),
        Some(CaptureEvent::Saved {
            folder: "captures/C-001".to_string(),
            embedding: Some(vec![0.5, 0.5])
        })
    );
}

#[test]
fn noise_is_ignored() {
    assert_eq!(parse_line(""), None);
    assert_eq!(parse_line("   "), None);
    assert_eq!(parse_line("Traceback (most recent call last):"), None);
    assert_eq!(parse_line(r#"{"unrelated": 1}"#), None);
    assert_eq!(parse_line(r#"{"event": "saved"}"#), None);
}

#[test]
fn events_serialize_in_process_shape() {
    let json = serde_json::to_value(CaptureEvent::Saved {
        folder: "captures/C-001".to_string(),
        embedding: None,
    })
    .expect("serializes");
    assert_eq!(json, serde_json::json!({"event": "saved", "folder": "captures/C-001"}));
}

fn saved(folder: &str, embedding: Option<Vec<f32>>) -> CaptureEvent {
    CaptureEvent::Saved {
        folder: folder.to_string(),
        embedding,
    }
}

#[test]
fn capture_set_collects_saved_embeddings() {
    let events = vec![
        CaptureEvent::Ready,
        saved("captures/a", Some(vec![1.0, 0.0])),
        CaptureEvent::Info("Processing".to_string()),
        saved("captures/b", None),
        saved("captures/c", Some(vec![0.0, 1.0])),
    ];

    let set = CaptureSet::from_events(&events).expect("collects");
    assert_eq!(set.vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert_eq!(set.folder.as_deref(), Some("captures/a"));
}

#[test]
fn capture_set_bounds() {
    assert!(CaptureSet::from_events(&[CaptureEvent::Ready]).is_err());

    let events: Vec<_> = (0..4)
        .map(|i| saved(&format!("captures/{}", i), Some(vec![1.0, 0.0])))
        .collect();
    assert!(matches!(
        CaptureSet::from_events(&events),
        Err(RegistryError::Validation(_))
    ));
}

//! Tests for project profiles and profile tables.

use framepick::{FramePickError, ProfileTable, ProjectProfile};

fn profile(id: &str, weights: (f64, f64, f64)) -> ProjectProfile {
    ProjectProfile {
        id: id.to_string(),
        name: id.to_uppercase(),
        description: String::new(),
        face_weight: weights.0,
        sharpness_weight: weights.1,
        stability_weight: weights.2,
        require_faces: false,
        min_sharpness: 0.0,
    }
}

// ── Built-in table ─────────────────────────────────────────────────

#[test]
fn test_builtin_profiles() {
    let table = ProfileTable::builtin();
    let ids: Vec<&str> = table.profiles().iter().map(|profile| profile.id.as_str()).collect();
    assert_eq!(ids, vec!["podcast", "documentary", "commercial", "interview", "b-roll"]);
    assert_eq!(table.default_profile().id, "podcast");

    let interview = table.get("interview").unwrap();
    assert_eq!(
        (interview.face_weight, interview.sharpness_weight, interview.stability_weight),
        (0.6, 0.25, 0.15)
    );
    assert!(interview.require_faces);
}

#[test]
fn test_builtin_weights_sum_to_one() {
    for profile in ProfileTable::builtin().profiles() {
        let (face, sharpness, stability) = profile.normalized_weights();
        assert!((face + sharpness + stability - 1.0).abs() < 1e-9, "{}", profile.id);
    }
}

#[test]
fn test_lookup_is_case_insensitive() {
    let table = ProfileTable::builtin();
    assert_eq!(table.get("PODCAST").unwrap().id, "podcast");
    assert_eq!(table.get("B-Roll").unwrap().id, "b-roll");
    assert_eq!(table.get(" documentary ").unwrap().id, "documentary");
    assert!(table.get("wedding").is_none());
}

#[test]
fn test_resolve_falls_back_to_default() {
    let table = ProfileTable::builtin();
    assert_eq!(table.resolve("wedding").id, "podcast");
    assert_eq!(table.resolve("").id, "podcast");
    assert_eq!(table.resolve("commercial").id, "commercial");
}

// ── Custom tables ──────────────────────────────────────────────────

#[test]
fn test_normalized_weights() {
    let (face, sharpness, stability) = profile("custom", (2.0, 1.0, 1.0)).normalized_weights();
    assert!((face - 0.5).abs() < 1e-12);
    assert!((sharpness - 0.25).abs() < 1e-12);
    assert!((stability - 0.25).abs() < 1e-12);
}

#[test]
fn test_new_table_uses_first_profile_as_default() {
    let table = ProfileTable::new(vec![profile("Wedding", (0.4, 0.4, 0.2)), profile("sports", (0.1, 0.3, 0.6))])
        .unwrap();
    assert_eq!(table.default_profile().id, "wedding");
    assert_eq!(table.resolve("unknown").id, "wedding");
}

#[test]
fn test_table_rejects_invalid_profiles() {
    let invalid = |profiles: Vec<ProjectProfile>| {
        matches!(ProfileTable::new(profiles), Err(FramePickError::InvalidProfileTable(_)))
    };

    assert!(invalid(Vec::new()));
    assert!(invalid(vec![profile("", (1.0, 1.0, 1.0))]));
    assert!(invalid(vec![profile("a", (1.0, 0.0, 0.0)), profile("A", (0.0, 1.0, 0.0))]));
    assert!(invalid(vec![profile("a", (-0.5, 1.0, 0.5))]));
    assert!(invalid(vec![profile("a", (0.0, 0.0, 0.0))]));
    assert!(invalid(vec![profile("a", (f64::NAN, 1.0, 0.0))]));

    let mut threshold = profile("a", (1.0, 1.0, 1.0));
    threshold.min_sharpness = 1.5;
    assert!(invalid(vec![threshold]));
}

#[test]
fn test_table_from_json() {
    let json = r#"{
        "default": "Stills",
        "profiles": [
            {"id": "reels", "name": "Reels", "face_weight": 0.2, "sharpness_weight": 0.3, "stability_weight": 0.5},
            {"id": "stills", "name": "Stills", "description": "Sharp product shots",
             "face_weight": 0, "sharpness_weight": 0.9, "stability_weight": 0.1,
             "require_faces": false, "min_sharpness": 0.3}
        ]
    }"#;

    let table = ProfileTable::from_json(json).unwrap();
    assert_eq!(table.profiles().len(), 2);
    assert_eq!(table.default_profile().id, "stills");
    assert_eq!(table.get("stills").unwrap().min_sharpness, 0.3);
    assert_eq!(table.get("reels").unwrap().min_sharpness, 0.0);
    assert!(!table.get("reels").unwrap().require_faces);
}

#[test]
fn test_table_from_invalid_json() {
    assert!(matches!(
        ProfileTable::from_json("not json"),
        Err(FramePickError::InvalidProfileTable(_))
    ));
    assert!(matches!(
        ProfileTable::from_json(r#"{"profiles": []}"#),
        Err(FramePickError::InvalidProfileTable(_))
    ));
    let unknown_default = r#"{"default": "x", "profiles": [
        {"id": "a", "name": "A", "face_weight": 1, "sharpness_weight": 0, "stability_weight": 0}
    ]}"#;
    assert!(matches!(
        ProfileTable::from_json(unknown_default),
        Err(FramePickError::InvalidProfileTable(_))
    ));
}

#[test]
fn test_profiles_serialize_to_json() {
    let json = serde_json::to_value(ProfileTable::builtin().profiles()).unwrap();
    assert_eq!(json[0]["id"], "podcast");
    assert_eq!(json[0]["face_weight"], 0.5);
    assert_eq!(json[4]["require_faces"], false);
}

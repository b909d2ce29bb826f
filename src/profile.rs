//! Project-type weighting profiles.
//!
//! A [`ProjectProfile`] decides how much face presence, sharpness and
//! stability contribute to a frame's composite score. Profiles are plain
//! data held in a [`ProfileTable`]; the built-in table covers podcasts,
//! documentaries, commercials, interviews and B-roll, and custom tables can
//! be loaded from JSON.
//!
//! ```
//! use framepick::ProfileTable;
//!
//! let table = ProfileTable::builtin();
//! let interview = table.resolve("Interview");
//! assert_eq!(interview.id, "interview");
//! assert!(interview.require_faces);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::FramePickError;

/// Scoring weights for one kind of production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProfile {
    /// Lowercase identifier used in analysis requests (e.g. `"b-roll"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the profile is tuned for.
    #[serde(default)]
    pub description: String,
    /// Weight of the face sub-score.
    pub face_weight: f64,
    /// Weight of the sharpness sub-score.
    pub sharpness_weight: f64,
    /// Weight of the stability sub-score.
    pub stability_weight: f64,
    /// Halve the composite of frames without faces when a detector is
    /// available.
    #[serde(default)]
    pub require_faces: bool,
    /// Normalized sharpness below which samples are dropped.
    #[serde(default)]
    pub min_sharpness: f64,
}

impl ProjectProfile {
    /// `(face, sharpness, stability)` weights scaled to sum to 1.
    pub fn normalized_weights(&self) -> (f64, f64, f64) {
        let total = self.face_weight + self.sharpness_weight + self.stability_weight;
        if total <= 0.0 {
            return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        }
        (
            self.face_weight / total,
            self.sharpness_weight / total,
            self.stability_weight / total,
        )
    }

    fn builtin(
        id: &str,
        name: &str,
        description: &str,
        weights: (f64, f64, f64),
        require_faces: bool,
        min_sharpness: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            face_weight: weights.0,
            sharpness_weight: weights.1,
            stability_weight: weights.2,
            require_faces,
            min_sharpness,
        }
    }

    fn validate(&self) -> Result<(), FramePickError> {
        let invalid = |reason: &str| FramePickError::InvalidProfileTable(format!("profile '{}': {reason}", self.id));
        if self.id.trim().is_empty() {
            return Err(FramePickError::InvalidProfileTable("profile with empty id".to_string()));
        }
        let weights = [self.face_weight, self.sharpness_weight, self.stability_weight];
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            return Err(invalid("weights must be finite and non-negative"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(invalid("weights must not all be zero"));
        }
        if !(0.0..=1.0).contains(&self.min_sharpness) {
            return Err(invalid("min_sharpness must be within [0, 1]"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct ProfileTableFile {
    #[serde(default)]
    default: Option<String>,
    profiles: Vec<ProjectProfile>,
}

/// An ordered set of profiles with a designated default.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    profiles: Vec<ProjectProfile>,
    default_index: usize,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileTable {
    /// The built-in profiles. `podcast` is the default.
    pub fn builtin() -> Self {
        let profiles = vec![
            ProjectProfile::builtin(
                "podcast",
                "Podcast",
                "Podcast recordings with people on camera",
                (0.5, 0.3, 0.2),
                true,
                0.15,
            ),
            ProjectProfile::builtin(
                "documentary",
                "Documentary",
                "Visually appealing frames for documentaries",
                (0.2, 0.5, 0.3),
                false,
                0.1,
            ),
            ProjectProfile::builtin(
                "commercial",
                "Commercial",
                "Aesthetic, dynamic frames for advertising",
                (0.3, 0.4, 0.3),
                false,
                0.08,
            ),
            ProjectProfile::builtin(
                "interview",
                "Interview",
                "Focus on faces and expression",
                (0.6, 0.25, 0.15),
                true,
                0.12,
            ),
            ProjectProfile::builtin(
                "b-roll",
                "B-Roll",
                "Visual variety for B-roll footage",
                (0.1, 0.5, 0.4),
                false,
                0.05,
            ),
        ];
        Self {
            profiles,
            default_index: 0,
        }
    }

    /// Build a table from profiles. The first profile is the default.
    ///
    /// # Errors
    ///
    /// [`FramePickError::InvalidProfileTable`] when the list is empty, ids
    /// repeat, or a profile has invalid weights or thresholds.
    pub fn new(profiles: Vec<ProjectProfile>) -> Result<Self, FramePickError> {
        Self::with_default(profiles, None)
    }

    /// Load a table from JSON of the form
    /// `{"default": "podcast", "profiles": [ ... ]}`. `default` is optional.
    ///
    /// # Errors
    ///
    /// [`FramePickError::InvalidProfileTable`] on malformed JSON, an unknown
    /// default id, or any error [`new`](ProfileTable::new) reports.
    pub fn from_json(json: &str) -> Result<Self, FramePickError> {
        let file: ProfileTableFile =
            serde_json::from_str(json).map_err(|error| FramePickError::InvalidProfileTable(error.to_string()))?;
        Self::with_default(file.profiles, file.default.as_deref())
    }

    fn with_default(mut profiles: Vec<ProjectProfile>, default: Option<&str>) -> Result<Self, FramePickError> {
        if profiles.is_empty() {
            return Err(FramePickError::InvalidProfileTable("no profiles defined".to_string()));
        }
        for profile in &mut profiles {
            profile.id = profile.id.trim().to_ascii_lowercase();
            profile.validate()?;
        }
        for (index, profile) in profiles.iter().enumerate() {
            if profiles[..index].iter().any(|other| other.id == profile.id) {
                return Err(FramePickError::InvalidProfileTable(format!(
                    "duplicate profile id '{}'",
                    profile.id
                )));
            }
        }

        let default_index = match default {
            None => 0,
            Some(id) => {
                let id = id.trim().to_ascii_lowercase();
                profiles
                    .iter()
                    .position(|profile| profile.id == id)
                    .ok_or_else(|| FramePickError::InvalidProfileTable(format!("unknown default profile '{id}'")))?
            }
        };

        Ok(Self {
            profiles,
            default_index,
        })
    }

    /// Look up a profile by id or display name, case-insensitively.
    pub fn get(&self, id: &str) -> Option<&ProjectProfile> {
        let needle = id.trim();
        self.profiles
            .iter()
            .find(|profile| profile.id.eq_ignore_ascii_case(needle) || profile.name.eq_ignore_ascii_case(needle))
    }

    /// Look up a profile, falling back to the default for unknown ids.
    pub fn resolve(&self, id: &str) -> &ProjectProfile {
        match self.get(id) {
            Some(profile) => profile,
            None => {
                let fallback = self.default_profile();
                log::warn!("Unknown project type '{id}', using '{}'", fallback.id);
                fallback
            }
        }
    }

    /// The profile unknown ids fall back to.
    pub fn default_profile(&self) -> &ProjectProfile {
        &self.profiles[self.default_index]
    }

    /// All profiles in table order.
    pub fn profiles(&self) -> &[ProjectProfile] {
        &self.profiles
    }
}

//! Endpoint catalog and per-media polling defaults.
//!
//! The catalog is loaded from an embedded YAML template so that adding an
//! endpoint or tuning a media kind's timeout is a data change, not a new
//! wrapper function.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::job::{JobError, PollSettings};

/// Raw contents of the embedded catalog.
pub const PROFILES_YAML: &str = include_str!("templates/profiles.yaml");

/// Kind of media an endpoint produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still images.
    Image,
    /// Video clips.
    Video,
    /// Speech, music, sound.
    Audio,
    /// 3D meshes.
    ThreeD,
    /// Face swaps.
    Deepfake,
    /// Interior design renders.
    Interior,
    /// Text completions.
    Text,
}

impl MediaKind {
    /// All kinds, in catalog order.
    pub const ALL: [Self; 7] = [
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::ThreeD,
        Self::Deepfake,
        Self::Interior,
        Self::Text,
    ];

    /// Catalog key for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::ThreeD => "three_d",
            Self::Deepfake => "deepfake",
            Self::Interior => "interior",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized || (normalized == "3d" && *kind == Self::ThreeD))
            .with_context(|| format!("Unknown media kind: {s}"))
    }
}

/// Polling defaults and status path for one media kind.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaProfile {
    /// Human-readable description.
    pub description: String,
    /// Seconds to wait between polls.
    pub poll_interval_secs: u64,
    /// Total polling budget in seconds.
    pub timeout_secs: u64,
    /// Status-fetch path template containing `{id}`.
    pub fetch_path: String,
}

impl MediaProfile {
    /// Poll settings for this kind.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::from_secs(self.poll_interval_secs, self.timeout_secs)
    }
}

/// One generation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSpec {
    /// Short name used on the command line.
    pub name: String,
    /// Path relative to the base URL.
    pub path: String,
    /// Media kind, selecting polling defaults.
    pub media: MediaKind,
    /// Parameters the endpoint rejects requests without.
    #[serde(default)]
    pub required: Vec<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl EndpointSpec {
    /// Returns the required parameters absent from `params`.
    ///
    /// Null and empty-string values count as absent.
    pub fn missing_parameters(&self, params: &Map<String, Value>) -> Vec<String> {
        self.required
            .iter()
            .filter(|name| match params.get(name.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .cloned()
            .collect()
    }

    /// Fails with [`JobError::MissingParameters`] if any required
    /// parameter is absent.
    pub fn validate(&self, params: &Map<String, Value>) -> Result<(), JobError> {
        let missing = self.missing_parameters(params);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(JobError::MissingParameters {
                endpoint: self.name.clone(),
                missing,
            })
        }
    }
}

/// Complete catalog.
#[derive(Debug, Deserialize)]
pub struct ProfileConfiguration {
    /// Profiles keyed by media kind.
    pub media: HashMap<MediaKind, MediaProfile>,
    /// All known endpoints.
    pub endpoints: Vec<EndpointSpec>,
}

/// Lookup structure over the catalog.
pub struct ProfileRegistry {
    config: ProfileConfiguration,
    by_name: HashMap<String, usize>,
}

impl ProfileRegistry {
    /// Loads the embedded catalog.
    pub fn load() -> Result<Self> {
        Self::from_yaml(PROFILES_YAML)
    }

    /// Parses and checks a catalog.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProfileConfiguration =
            serde_yaml::from_str(yaml).context("Failed to parse endpoint profiles")?;

        let mut by_name = HashMap::new();
        for (index, endpoint) in config.endpoints.iter().enumerate() {
            if !config.media.contains_key(&endpoint.media) {
                bail!(
                    "Endpoint {} uses media kind {} which has no profile",
                    endpoint.name,
                    endpoint.media
                );
            }
            if by_name.insert(endpoint.name.clone(), index).is_some() {
                bail!("Duplicate endpoint name: {}", endpoint.name);
            }
        }

        Ok(Self { config, by_name })
    }

    /// Looks up an endpoint by name.
    pub fn endpoint(&self, name: &str) -> Option<&EndpointSpec> {
        self.by_name
            .get(name)
            .and_then(|&index| self.config.endpoints.get(index))
    }

    /// All endpoints in catalog order.
    pub fn endpoints(&self) -> &[EndpointSpec] {
        &self.config.endpoints
    }

    /// Profile for a media kind.
    pub fn media(&self, kind: MediaKind) -> Option<&MediaProfile> {
        self.config.media.get(&kind)
    }

    /// Poll settings for a media kind, falling back to the crate default.
    pub fn poll_settings(&self, kind: MediaKind) -> PollSettings {
        self.media(kind)
            .map(MediaProfile::poll_settings)
            .unwrap_or_default()
    }

    /// Resolves a catalog name or a raw path.
    ///
    /// Unknown names are treated as raw paths for image-like jobs, with no
    /// required parameters.
    pub fn resolve(&self, name_or_path: &str) -> EndpointSpec {
        self.endpoint(name_or_path)
            .cloned()
            .unwrap_or_else(|| EndpointSpec {
                name: name_or_path.to_string(),
                path: name_or_path.to_string(),
                media: MediaKind::Image,
                required: Vec::new(),
                description: String::new(),
            })
    }
}

static PROFILE_REGISTRY: OnceLock<ProfileRegistry> = OnceLock::new();

/// Returns the process-wide registry, loading it on first use.
pub fn get_profile_registry() -> Result<&'static ProfileRegistry> {
    if let Some(registry) = PROFILE_REGISTRY.get() {
        return Ok(registry);
    }
    let registry = ProfileRegistry::load()?;
    Ok(PROFILE_REGISTRY.get_or_init(|| registry))
}

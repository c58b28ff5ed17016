use std::fs;

use anyhow::Context;
use serde::Deserialize;

use doctor_cell::models::DoctorSchedule;
use patient_cell::models::PatientProfile;

/// Profiles loaded into the in-memory directories at startup. Profile CRUD
/// lives with the identity provider, so this file is the only way to
/// populate them without Supabase.
#[derive(Debug, Default, Deserialize)]
pub struct MemorySeed {
    #[serde(default)]
    pub doctors: Vec<DoctorSchedule>,
    #[serde(default)]
    pub patients: Vec<PatientProfile>,
}

impl MemorySeed {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading memory seed {}", path))?;
        Self::from_json(&raw).with_context(|| format!("parsing memory seed {}", path))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

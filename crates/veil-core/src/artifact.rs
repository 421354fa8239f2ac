//! Artifacts: the payloads of paid submissions.
//!
//! Three kinds are submitted to the network: a compiled [`Program`], a
//! [`SecretValueSet`], and a [`ComputeJob`] that runs a stored program over
//! stored and inline values. Each knows how to describe itself for pricing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};
use crate::permissions::Permissions;
use crate::quote::OperationDescriptor;
use crate::types::{PartyId, ProgramId, StoreId, UserId};

/// A typed value fed to or produced by a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SecretValue {
    Integer(i64),
    UnsignedInteger(u64),
    Boolean(bool),
    Blob(Vec<u8>),
}

impl SecretValue {
    /// Approximate encoded size, used for pricing.
    pub fn size_bytes(&self) -> u64 {
        match self {
            SecretValue::Integer(_) | SecretValue::UnsignedInteger(_) => 8,
            SecretValue::Boolean(_) => 1,
            SecretValue::Blob(bytes) => bytes.len() as u64,
        }
    }
}

/// Named values, keyed by variable name.
pub type NamedValues = BTreeMap<String, SecretValue>;

fn payload_bytes(values: &NamedValues) -> u64 {
    values
        .iter()
        .map(|(name, value)| name.len() as u64 + value.size_bytes())
        .sum()
}

/// Party names a program declares for input and output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramParties {
    pub inputs: BTreeSet<String>,
    pub outputs: BTreeSet<String>,
}

impl ProgramParties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.insert(name.into());
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.insert(name.into());
        self
    }
}

/// A compiled program to upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,

    /// Compiled program bytes.
    pub payload: Vec<u8>,

    pub owner: UserId,

    /// Parties the program declares, as extracted at compile time.
    pub parties: ProgramParties,
}

impl Program {
    pub fn new(
        name: impl Into<String>,
        payload: Vec<u8>,
        owner: UserId,
        parties: ProgramParties,
    ) -> Self {
        Self {
            name: name.into(),
            payload,
            owner,
            parties,
        }
    }

    /// Load a compiled program from disk.
    pub async fn from_file(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        owner: UserId,
        parties: ProgramParties,
    ) -> Result<Self> {
        let path = path.as_ref();
        let payload = tokio::fs::read(path).await.map_err(|e| {
            VeilError::InvalidArtifact(format!("cannot read program {}: {}", path.display(), e))
        })?;
        Ok(Self::new(name, payload, owner, parties))
    }

    /// The id this program is stored under.
    pub fn id(&self) -> ProgramId {
        ProgramId::new(&self.owner, &self.name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.name.contains('/') {
            return Err(VeilError::InvalidArtifact(format!(
                "invalid program name '{}'",
                self.name
            )));
        }
        if self.payload.is_empty() {
            return Err(VeilError::InvalidArtifact(
                "program payload is empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor::StoreProgram {
            program_name: self.name.clone(),
            payload_bytes: self.payload.len() as u64,
        }
    }
}

/// Secret values to store, with their permissions and lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretValueSet {
    pub values: NamedValues,
    pub permissions: Permissions,
    pub ttl_days: u32,
}

impl SecretValueSet {
    pub fn new(values: NamedValues, permissions: Permissions, ttl_days: u32) -> Self {
        Self {
            values,
            permissions,
            ttl_days,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(VeilError::InvalidArtifact(
                "secret value set is empty".to_string(),
            ));
        }
        if self.ttl_days == 0 {
            return Err(VeilError::InvalidArtifact(
                "ttl must be at least one day".to_string(),
            ));
        }
        Ok(())
    }

    pub fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor::StoreValues {
            value_count: self.values.len() as u32,
            payload_bytes: payload_bytes(&self.values),
            ttl_days: self.ttl_days,
        }
    }
}

/// Binds a program's declared parties to network participants for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramBindings {
    pub program_id: ProgramId,
    pub input_parties: BTreeMap<String, PartyId>,
    pub output_parties: BTreeMap<String, PartyId>,
}

impl ProgramBindings {
    pub fn new(program_id: ProgramId) -> Self {
        Self {
            program_id,
            input_parties: BTreeMap::new(),
            output_parties: BTreeMap::new(),
        }
    }

    pub fn add_input_party(&mut self, name: impl Into<String>, party: PartyId) {
        self.input_parties.insert(name.into(), party);
    }

    pub fn add_output_party(&mut self, name: impl Into<String>, party: PartyId) {
        self.output_parties.insert(name.into(), party);
    }

    pub fn input(mut self, name: impl Into<String>, party: PartyId) -> Self {
        self.add_input_party(name, party);
        self
    }

    pub fn output(mut self, name: impl Into<String>, party: PartyId) -> Self {
        self.add_output_party(name, party);
        self
    }
}

/// One run of a stored program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeJob {
    pub bindings: ProgramBindings,

    /// Stored value sets, in the order the program consumes them.
    pub store_ids: Vec<StoreId>,

    /// Values supplied for this run only.
    #[serde(default)]
    pub inline_values: NamedValues,
}

impl ComputeJob {
    pub fn new(bindings: ProgramBindings, store_ids: Vec<StoreId>) -> Self {
        Self {
            bindings,
            store_ids,
            inline_values: NamedValues::new(),
        }
    }

    pub fn with_inline_values(mut self, values: NamedValues) -> Self {
        self.inline_values = values;
        self
    }

    pub fn program_id(&self) -> &ProgramId {
        &self.bindings.program_id
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for id in &self.store_ids {
            if !seen.insert(id) {
                return Err(VeilError::InvalidArtifact(format!(
                    "store {} referenced twice",
                    id
                )));
            }
        }
        Ok(())
    }

    pub fn descriptor(&self) -> OperationDescriptor {
        OperationDescriptor::Compute {
            program_id: self.bindings.program_id.clone(),
            input_store_count: self.store_ids.len() as u32,
            inline_value_count: self.inline_values.len() as u32,
        }
    }
}

/// Any payload of a paid submission, as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Program(Program),
    SecretValues(SecretValueSet),
    Compute(ComputeJob),
}

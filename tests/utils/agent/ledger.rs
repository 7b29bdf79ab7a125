//! Stand-ins for the ledger and the anoncreds library. Artifacts are plain
//! JSON carrying just enough for the engine to route them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use serde_json::{Value, json};
use vc_exchange::provider::{CredentialRequest, IssuerDefinition, Ledger, RevocationConfig};

pub const SCHEMA_ID: &str = "schema:degree:1.0";
pub const CRED_DEF_ID: &str = "creddef:degree";
pub const REVOCABLE_CRED_DEF_ID: &str = "creddef:degree:revocable";
pub const REV_REG_ID: &str = "revreg:degree:1";

#[derive(Clone, Debug, Default)]
pub struct FakeLedger {
    lookups: Arc<AtomicUsize>,
}

impl FakeLedger {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Ledger for FakeLedger {
    async fn credential_definition(&self, cred_def_id: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match cred_def_id {
            CRED_DEF_ID | REVOCABLE_CRED_DEF_ID => {
                Ok(json!({"id": cred_def_id, "schemaId": SCHEMA_ID}).to_string())
            }
            _ => bail!("credential definition {cred_def_id} not on ledger"),
        }
    }

    async fn schema(&self, schema_id: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if schema_id != SCHEMA_ID {
            bail!("schema {schema_id} not on ledger");
        }
        Ok(json!({"id": SCHEMA_ID, "attrNames": ["name", "degree"]}).to_string())
    }

    async fn revocation_registry_definition(&self, rev_reg_id: &str) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if rev_reg_id != REV_REG_ID {
            bail!("revocation registry {rev_reg_id} not on ledger");
        }
        Ok(json!({"id": REV_REG_ID, "credDefId": REVOCABLE_CRED_DEF_ID}).to_string())
    }
}

pub fn definition(cred_def_id: &str) -> Result<IssuerDefinition> {
    if cred_def_id != CRED_DEF_ID && cred_def_id != REVOCABLE_CRED_DEF_ID {
        bail!("no issuer definition for {cred_def_id}");
    }
    Ok(IssuerDefinition {
        credential_definition_id: cred_def_id.into(),
        schema_id: SCHEMA_ID.into(),
        credential_definition: json!({"id": cred_def_id}).to_string(),
        credential_definition_private: json!({"secret": "p"}).to_string(),
        key_correctness_proof: json!({"c": "1"}).to_string(),
    })
}

pub fn revocation(cred_def_id: &str) -> Option<RevocationConfig> {
    (cred_def_id == REVOCABLE_CRED_DEF_ID).then(|| RevocationConfig {
        registry_definition: json!({"id": REV_REG_ID}).to_string(),
        registry_definition_private: json!({"secret": "r"}).to_string(),
        status_list: json!({"revoked": []}).to_string(),
        registry_index: 1,
    })
}

/// Deterministic anoncreds. `fail` makes every credential operation fail.
#[derive(Clone, Debug, Default)]
pub struct FakeAnoncreds {
    fail: Arc<AtomicBool>,
    stored: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeAnoncreds {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> usize {
        self.stored.lock().expect("should lock").len()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("anoncreds unavailable");
        }
        Ok(())
    }

    pub fn create_offer(
        &self, schema_id: &str, cred_def_id: &str, key_correctness_proof: &str,
    ) -> Result<String> {
        self.check()?;
        let kcp: Value = serde_json::from_str(key_correctness_proof)?;
        Ok(json!({
            "schema_id": schema_id,
            "cred_def_id": cred_def_id,
            "key_correctness_proof": kcp,
            "nonce": "1234"
        })
        .to_string())
    }

    pub fn create_request(
        &self, holder_did: &str, link_secret_id: &str, offer: &str,
    ) -> Result<CredentialRequest> {
        self.check()?;
        let offer: Value = serde_json::from_str(offer)?;
        let cred_def_id = offer["cred_def_id"].as_str().ok_or_else(|| anyhow!("no cred_def_id"))?;
        Ok(CredentialRequest {
            request: json!({
                "prover_did": holder_did,
                "cred_def_id": cred_def_id,
                "nonce": "5678"
            })
            .to_string(),
            metadata: json!({"link_secret_name": link_secret_id, "nonce": "5678"}).to_string(),
        })
    }

    pub fn create_credential(
        &self, definition: &IssuerDefinition, claims: &BTreeMap<String, String>,
        revocation: Option<&RevocationConfig>,
    ) -> Result<String> {
        self.check()?;
        let rev_reg_id = match revocation {
            Some(config) => {
                let registry: Value = serde_json::from_str(&config.registry_definition)?;
                registry["id"].as_str().map(ToString::to_string)
            }
            None => None,
        };
        Ok(json!({
            "schema_id": definition.schema_id,
            "cred_def_id": definition.credential_definition_id,
            "rev_reg_id": rev_reg_id,
            "values": claims
        })
        .to_string())
    }

    pub fn process_credential(&self, credential: &str, request_metadata: &str) -> Result<String> {
        self.check()?;
        let metadata: Value = serde_json::from_str(request_metadata)?;
        if metadata["link_secret_name"].is_null() {
            bail!("request metadata has no link secret");
        }
        let mut stored = self.stored.lock().expect("should lock");
        let credential_id = format!("credential-{}", stored.len() + 1);
        stored.insert(credential_id.clone(), credential.to_string());
        Ok(credential_id)
    }
}

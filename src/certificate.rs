use crate::error::ChirographError;
use chirograph_slot_contract::{SlotPayload, UrlRole};
use serde::{Deserialize, Serialize};

/// Everything printed on one certificate. Immutable for the duration of a
/// generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSpec {
    pub label: String,
    pub primary_link: String,
    pub secondary_link: String,
    pub issuer_token: String,
    pub owner_token: String,
    pub primary_asset_verifier: String,
    pub secondary_asset_verifier: String,
    pub primary_owner_verifier: String,
    pub secondary_owner_verifier: String,
    pub primary_issuer_verifier: String,
    pub secondary_issuer_verifier: String,
    pub mail_to_left: String,
    pub mail_to_right: String,
    #[serde(default)]
    pub helpers: HelperTexts,
}

/// Instruction texts printed in the page margins around the tally region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperTexts {
    #[serde(default)]
    pub top: Option<String>,
    #[serde(default)]
    pub bottom: Option<String>,
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
}

impl HelperTexts {
    pub fn is_empty(&self) -> bool {
        [&self.top, &self.bottom, &self.left, &self.right]
            .iter()
            .all(|text| text.as_deref().map(str::trim).unwrap_or("").is_empty())
    }
}

impl CertificateSpec {
    pub fn from_json(raw: &str) -> Result<Self, ChirographError> {
        let spec: CertificateSpec = serde_json::from_str(raw)
            .map_err(|err| ChirographError::Config(format!("certificate json: {err}")))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_json(&self) -> Result<String, ChirographError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ChirographError::Config(format!("certificate json: {err}")))
    }

    /// Placeholder certificate used by the command line when only a label is given.
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            primary_link: "PrimaryLinkURL".to_string(),
            secondary_link: "SecondaryLinkURL".to_string(),
            issuer_token: "IssuerTokenURL".to_string(),
            owner_token: "OwnerTokenURL".to_string(),
            primary_asset_verifier: "PrimaryAssetVerifierURL".to_string(),
            secondary_asset_verifier: "SecondaryAssetVerifierURL".to_string(),
            primary_owner_verifier: "PrimaryOwnerVerifierURL".to_string(),
            secondary_owner_verifier: "SecondaryOwnerVerifierURL".to_string(),
            primary_issuer_verifier: "PrimaryIssuerVerifierURL".to_string(),
            secondary_issuer_verifier: "SecondaryIssuerVerifierURL".to_string(),
            mail_to_left: "MailToLeft".to_string(),
            mail_to_right: "MailToRight".to_string(),
            helpers: HelperTexts::default(),
        }
    }

    pub fn with_default_helpers(mut self) -> Self {
        self.helpers = HelperTexts {
            top: Some(TOP_HELPER.to_string()),
            bottom: Some(BOTTOM_HELPER.to_string()),
            left: Some(LEFT_HELPER.to_string()),
            right: Some(RIGHT_HELPER.to_string()),
        };
        self
    }

    pub fn url(&self, role: UrlRole) -> &str {
        match role {
            UrlRole::PrimaryLink => &self.primary_link,
            UrlRole::SecondaryLink => &self.secondary_link,
            UrlRole::IssuerToken => &self.issuer_token,
            UrlRole::OwnerToken => &self.owner_token,
            UrlRole::PrimaryAssetVerifier => &self.primary_asset_verifier,
            UrlRole::SecondaryAssetVerifier => &self.secondary_asset_verifier,
            UrlRole::PrimaryOwnerVerifier => &self.primary_owner_verifier,
            UrlRole::SecondaryOwnerVerifier => &self.secondary_owner_verifier,
            UrlRole::PrimaryIssuerVerifier => &self.primary_issuer_verifier,
            UrlRole::SecondaryIssuerVerifier => &self.secondary_issuer_verifier,
        }
    }

    pub fn payload(&self, payload: SlotPayload) -> &str {
        match payload {
            SlotPayload::Url(role) => self.url(role),
            SlotPayload::Label => &self.label,
            SlotPayload::MailToLeft => &self.mail_to_left,
            SlotPayload::MailToRight => &self.mail_to_right,
        }
    }

    /// Every required field must hold non-blank text. Helpers are optional.
    pub fn validate(&self) -> Result<(), ChirographError> {
        let mut missing = Vec::new();
        if self.label.trim().is_empty() {
            missing.push("label");
        }
        for role in UrlRole::ALL {
            if self.url(role).trim().is_empty() {
                missing.push(role.as_str());
            }
        }
        if self.mail_to_left.trim().is_empty() {
            missing.push("mail_to_left");
        }
        if self.mail_to_right.trim().is_empty() {
            missing.push("mail_to_right");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ChirographError::Config(format!(
                "certificate is missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

pub const TOP_HELPER: &str = "This certificate has 5 parts: CENTER, TOP, BOTTOM, LEFT and RIGHT. \
Print it on a single sheet of heavy paper and do not scale the page. \
Cut along every blue line with a sharp blade; the irregular line is what makes the parts fit only each other.";

pub const BOTTOM_HELPER: &str = "Keep the CENTER part. \
Mail the TOP and BOTTOM parts to the issuer and the LEFT and RIGHT parts to the addresses printed on them. \
To verify, the parts are glued back together: a copy never matches the original cut.";

pub const LEFT_HELPER: &str = "LEFT part: mail to the address printed on this strip. \
Do not fold across the codes.";

pub const RIGHT_HELPER: &str = "RIGHT part: mail to the address printed on this strip. \
Do not fold across the codes.";

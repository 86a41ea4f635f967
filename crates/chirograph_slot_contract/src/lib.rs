use sha2::{Digest, Sha256};
use std::sync::OnceLock;

pub const CONTRACT_ID: &str = "chirograph.slot_contract";
pub const CONTRACT_VERSION: &str = "1";

const SLOT_TABLE_ID: &str = "chirograph.slot_table.v1";

pub const GRID_H_BLOCKS: u8 = 9;
pub const GRID_V_BLOCKS: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKind {
    Barcode,
    Text,
    Qr,
    Reference,
    Logo,
}

impl SlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotKind::Barcode => "barcode",
            SlotKind::Text => "text",
            SlotKind::Qr => "qr",
            SlotKind::Reference => "reference",
            SlotKind::Logo => "logo",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "barcode" => Some(SlotKind::Barcode),
            "text" => Some(SlotKind::Text),
            "qr" => Some(SlotKind::Qr),
            "reference" => Some(SlotKind::Reference),
            "logo" => Some(SlotKind::Logo),
            _ => None,
        }
    }
}

/// Named URL roles a certificate carries. Every role is encoded at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UrlRole {
    PrimaryLink,
    SecondaryLink,
    IssuerToken,
    OwnerToken,
    PrimaryAssetVerifier,
    SecondaryAssetVerifier,
    PrimaryOwnerVerifier,
    SecondaryOwnerVerifier,
    PrimaryIssuerVerifier,
    SecondaryIssuerVerifier,
}

impl UrlRole {
    pub const ALL: [UrlRole; 10] = [
        UrlRole::PrimaryLink,
        UrlRole::SecondaryLink,
        UrlRole::IssuerToken,
        UrlRole::OwnerToken,
        UrlRole::PrimaryAssetVerifier,
        UrlRole::SecondaryAssetVerifier,
        UrlRole::PrimaryOwnerVerifier,
        UrlRole::SecondaryOwnerVerifier,
        UrlRole::PrimaryIssuerVerifier,
        UrlRole::SecondaryIssuerVerifier,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UrlRole::PrimaryLink => "primary_link",
            UrlRole::SecondaryLink => "secondary_link",
            UrlRole::IssuerToken => "issuer_token",
            UrlRole::OwnerToken => "owner_token",
            UrlRole::PrimaryAssetVerifier => "primary_asset_verifier",
            UrlRole::SecondaryAssetVerifier => "secondary_asset_verifier",
            UrlRole::PrimaryOwnerVerifier => "primary_owner_verifier",
            UrlRole::SecondaryOwnerVerifier => "secondary_owner_verifier",
            UrlRole::PrimaryIssuerVerifier => "primary_issuer_verifier",
            UrlRole::SecondaryIssuerVerifier => "secondary_issuer_verifier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotPayload {
    Url(UrlRole),
    Label,
    MailToLeft,
    MailToRight,
}

impl SlotPayload {
    pub fn key(self) -> String {
        match self {
            SlotPayload::Url(role) => format!("url:{}", role.as_str()),
            SlotPayload::Label => "label".to_string(),
            SlotPayload::MailToLeft => "mailto:left".to_string(),
            SlotPayload::MailToRight => "mailto:right".to_string(),
        }
    }
}

/// One fixed content slot. `row` indexes the 9-block axis, `column` the
/// 7-block axis. Heights and shifts are stored in thousandths of a block so the
/// table hashes identically on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDef {
    pub id: &'static str,
    pub kind: SlotKind,
    pub row: u8,
    pub column: u8,
    pub span: u8,
    pub rotated: bool,
    pub payload: SlotPayload,
    pub height_milli: u16,
    pub shift_milli: u16,
}

impl SlotDef {
    pub fn height_ratio(&self) -> f64 {
        self.height_milli as f64 / 1000.0
    }

    pub fn row_shift(&self) -> f64 {
        self.shift_milli as f64 / 1000.0
    }

    fn canonical_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}\n",
            self.id,
            self.kind.as_str(),
            self.row,
            self.column,
            self.span,
            if self.rotated { 1 } else { 0 },
            self.payload.key(),
            self.height_milli,
            self.shift_milli
        )
    }
}

use crate::SlotKind::{Barcode, Logo, Qr, Reference, Text};
use crate::SlotPayload::{Label, MailToLeft, MailToRight, Url};
use crate::UrlRole::*;

// Table order is draw order: barcodes are background for everything after them.
pub const SLOTS_V1: [SlotDef; 33] = [
    SlotDef { id: "barcode.side.left", kind: Barcode, row: 0, column: 6, span: 7, rotated: true, payload: Url(PrimaryLink), height_milli: 1900, shift_milli: 0 },
    SlotDef { id: "barcode.side.right", kind: Barcode, row: 7, column: 6, span: 7, rotated: true, payload: Url(PrimaryLink), height_milli: 1900, shift_milli: 100 },
    SlotDef { id: "barcode.center.0", kind: Barcode, row: 2, column: 0, span: 5, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "barcode.center.2", kind: Barcode, row: 2, column: 2, span: 5, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "barcode.center.4", kind: Barcode, row: 2, column: 4, span: 5, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "barcode.center.6", kind: Barcode, row: 2, column: 6, span: 5, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "label.center.1", kind: Text, row: 3, column: 1, span: 3, rotated: false, payload: Label, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "label.center.3", kind: Text, row: 3, column: 3, span: 3, rotated: false, payload: Label, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "label.center.5", kind: Text, row: 3, column: 5, span: 3, rotated: false, payload: Label, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "label.side.left", kind: Text, row: 0, column: 4, span: 3, rotated: true, payload: Label, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "label.side.right", kind: Text, row: 8, column: 4, span: 3, rotated: true, payload: Label, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.center.primary.5", kind: Qr, row: 2, column: 5, span: 1, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.center.owner_token", kind: Qr, row: 6, column: 5, span: 1, rotated: false, payload: Url(OwnerToken), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.center.primary.3", kind: Qr, row: 2, column: 3, span: 1, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.center.secondary.3", kind: Qr, row: 6, column: 3, span: 1, rotated: false, payload: Url(SecondaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.center.primary.1", kind: Qr, row: 2, column: 1, span: 1, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.center.issuer_token", kind: Qr, row: 6, column: 1, span: 1, rotated: false, payload: Url(IssuerToken), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.left.asset_verifier", kind: Qr, row: 1, column: 5, span: 1, rotated: false, payload: Url(PrimaryAssetVerifier), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.left.owner_verifier", kind: Qr, row: 1, column: 3, span: 1, rotated: false, payload: Url(PrimaryOwnerVerifier), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.left.issuer_verifier", kind: Qr, row: 1, column: 1, span: 1, rotated: false, payload: Url(PrimaryIssuerVerifier), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.right.asset_verifier", kind: Qr, row: 7, column: 5, span: 1, rotated: false, payload: Url(SecondaryAssetVerifier), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.right.owner_verifier", kind: Qr, row: 7, column: 3, span: 1, rotated: false, payload: Url(SecondaryOwnerVerifier), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.right.issuer_verifier", kind: Qr, row: 7, column: 1, span: 1, rotated: false, payload: Url(SecondaryIssuerVerifier), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.corner.top_left", kind: Qr, row: 0, column: 6, span: 1, rotated: true, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.corner.bottom_left", kind: Qr, row: 0, column: 0, span: 1, rotated: true, payload: Url(SecondaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.corner.top_right", kind: Qr, row: 8, column: 6, span: 1, rotated: true, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "qr.corner.bottom_right", kind: Qr, row: 8, column: 0, span: 1, rotated: true, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "reference.left", kind: Reference, row: 1, column: 6, span: 1, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "reference.right", kind: Reference, row: 7, column: 6, span: 1, rotated: false, payload: Url(PrimaryLink), height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "logo.left.flat", kind: Logo, row: 0, column: 1, span: 1, rotated: false, payload: MailToLeft, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "logo.left.rotated", kind: Logo, row: 0, column: 5, span: 1, rotated: true, payload: MailToLeft, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "logo.right.flat", kind: Logo, row: 8, column: 1, span: 1, rotated: false, payload: MailToRight, height_milli: 1000, shift_milli: 0 },
    SlotDef { id: "logo.right.rotated", kind: Logo, row: 8, column: 5, span: 1, rotated: true, payload: MailToRight, height_milli: 1000, shift_milli: 0 },
];

// Frozen registry of the table above. Printed sheets are verified against it, so
// the const table and this payload must never disagree.
const SLOT_TABLE_V1_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/contract/chirograph.slot_table.v1.json"
));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotContractMetadata {
    pub contract_id: &'static str,
    pub contract_version: &'static str,
    pub contract_fingerprint_sha256: String,
    pub slot_table_id: &'static str,
    pub slot_table_hash_sha256: String,
    pub slot_count: usize,
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

static SLOT_TABLE_HASH: OnceLock<String> = OnceLock::new();
static CONTRACT_FINGERPRINT: OnceLock<String> = OnceLock::new();

pub fn slot_defs_v1() -> &'static [SlotDef] {
    &SLOTS_V1
}

pub fn slot_def(slot_id: &str) -> Option<&'static SlotDef> {
    SLOTS_V1.iter().find(|d| d.id == slot_id)
}

pub fn slot_count(kind: SlotKind) -> usize {
    SLOTS_V1.iter().filter(|d| d.kind == kind).count()
}

pub fn payload_slot_count(payload: SlotPayload) -> usize {
    SLOTS_V1.iter().filter(|d| d.payload == payload).count()
}

pub fn slot_table_v1_json() -> &'static str {
    SLOT_TABLE_V1_JSON
}

/// Line-oriented canonical form of `SLOTS_V1`, one slot per line in draw order.
pub fn slot_table_v1_canonical() -> String {
    let mut out = String::new();
    for def in SLOTS_V1.iter() {
        out.push_str(&def.canonical_line());
    }
    out
}

pub fn slot_table_v1_hash_sha256() -> String {
    SLOT_TABLE_HASH
        .get_or_init(|| hex_sha256(slot_table_v1_canonical().as_bytes()))
        .clone()
}

pub fn contract_fingerprint_sha256() -> String {
    CONTRACT_FINGERPRINT
        .get_or_init(|| {
            let mut text = String::new();
            text.push_str(CONTRACT_ID);
            text.push('\n');
            text.push_str(CONTRACT_VERSION);
            text.push('\n');
            text.push_str(SLOT_TABLE_ID);
            text.push('\n');
            text.push_str(&slot_table_v1_hash_sha256());
            hex_sha256(text.as_bytes())
        })
        .clone()
}

pub fn metadata() -> SlotContractMetadata {
    SlotContractMetadata {
        contract_id: CONTRACT_ID,
        contract_version: CONTRACT_VERSION,
        contract_fingerprint_sha256: contract_fingerprint_sha256(),
        slot_table_id: SLOT_TABLE_ID,
        slot_table_hash_sha256: slot_table_v1_hash_sha256(),
        slot_count: SLOTS_V1.len(),
    }
}

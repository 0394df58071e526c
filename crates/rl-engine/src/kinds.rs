//! Builtin record kinds.
//!
//! Each function returns the immutable schema for one kind. Whether an
//! optional-looking field is "valid if empty" or "must be non-empty" is
//! decided per kind here, not by a shared default.

use rl_types::{EnumDomain, FieldRule, RecordSchema};

pub fn status_domain() -> EnumDomain {
    // Active, Inactive, Blocked, Deleted
    EnumDomain::new("status", ["A", "I", "B", "D"])
}

pub fn category_domain() -> EnumDomain {
    EnumDomain::new("category", ["1", "2", "3", "4", "5", "6", "7", "8"])
}

pub fn header_type_domain() -> EnumDomain {
    // Transactional, Service, Promotional, Government
    EnumDomain::new("header type", ["T", "S", "P", "G"])
}

pub fn template_type_domain() -> EnumDomain {
    EnumDomain::new(
        "template type",
        [
            "Transactional",
            "Service",
            "Promotional",
            "ServiceImplicit",
            "ServiceExplicit",
        ],
    )
}

pub fn entity_type_domain() -> EnumDomain {
    EnumDomain::new(
        "entity type",
        ["Enterprise", "Telemarketer", "Government", "Individual"],
    )
}

pub fn consent_status_domain() -> EnumDomain {
    EnumDomain::new("consent status", ["Active", "Revoked", "Expired"])
}

pub fn token_status_domain() -> EnumDomain {
    EnumDomain::new("token status", ["Issued", "Consumed", "Expired"])
}

pub fn delivery_status_domain() -> EnumDomain {
    EnumDomain::new(
        "delivery status",
        ["Submitted", "Delivered", "Failed", "Rejected"],
    )
}

pub fn employee_role_domain() -> EnumDomain {
    EnumDomain::new("employee role", ["Admin", "Operator", "Auditor"])
}

/// Sender header (CLI). `status` is optional at creation; `tmid` is only
/// checked when present.
pub fn header() -> RecordSchema {
    RecordSchema::new("header")
        .rule(FieldRule::mandatory("entity"))
        .rule(FieldRule::mandatory("name"))
        .rule(FieldRule::mandatory("type").one_of(header_type_domain()))
        .rule(FieldRule::mandatory("category").one_of(category_domain()))
        .rule(FieldRule::optional("tmid").integer())
        .rule(FieldRule::optional("status").one_of(status_domain()))
        .rule(FieldRule::mandatory("created"))
        .mutable(["status", "tmid"])
        .timestamps("created", "updated")
}

pub fn consent() -> RecordSchema {
    RecordSchema::new("consent")
        .rule(FieldRule::mandatory("entity"))
        .rule(FieldRule::mandatory("header"))
        .rule(FieldRule::mandatory("templateId"))
        .rule(FieldRule::mandatory("msisdn").integer())
        .rule(FieldRule::mandatory("status").one_of(consent_status_domain()))
        .rule(FieldRule::mandatory("created"))
        .rule(FieldRule::optional("expiry"))
        .mutable(["status", "expiry"])
        .timestamps("created", "updated")
}

pub fn entity() -> RecordSchema {
    RecordSchema::new("entity")
        .rule(FieldRule::mandatory("name"))
        .rule(FieldRule::mandatory("entityType").one_of(entity_type_domain()))
        .rule(FieldRule::mandatory("registrationNo"))
        .rule(FieldRule::mandatory("status").one_of(status_domain()))
        .rule(FieldRule::mandatory("createdAt"))
        .mutable(["status", "name"])
}

/// Scrub token. Updates may address a token by its `token` value instead
/// of its id.
pub fn scrub_token() -> RecordSchema {
    RecordSchema::new("scrub_token")
        .rule(FieldRule::mandatory("token"))
        .rule(FieldRule::mandatory("entity"))
        .rule(FieldRule::mandatory("header"))
        .rule(FieldRule::mandatory("templateId"))
        .rule(FieldRule::mandatory("status").one_of(token_status_domain()))
        .rule(FieldRule::optional("consumedBy"))
        .rule(FieldRule::mandatory("createdAt"))
        .mutable(["status", "consumedBy"])
        .lookup("token")
}

pub fn message_delivery() -> RecordSchema {
    RecordSchema::new("message_delivery")
        .rule(FieldRule::mandatory("scrubToken"))
        .rule(FieldRule::mandatory("tmid").integer())
        .rule(FieldRule::mandatory("msisdn").integer())
        .rule(FieldRule::mandatory("deliveryStatus").one_of(delivery_status_domain()))
        .rule(FieldRule::mandatory("createdAt"))
        .mutable(["deliveryStatus"])
}

pub fn template() -> RecordSchema {
    RecordSchema::new("template")
        .rule(FieldRule::mandatory("entity"))
        .rule(FieldRule::mandatory("header"))
        .rule(FieldRule::mandatory("content"))
        .rule(FieldRule::mandatory("templateType").one_of(template_type_domain()))
        .rule(FieldRule::mandatory("category").one_of(category_domain()))
        .rule(FieldRule::optional("status").one_of(status_domain()))
        .rule(FieldRule::optional("approvedBy"))
        .rule(FieldRule::mandatory("createdAt"))
        .mutable(["status", "approvedBy"])
}

pub fn employee() -> RecordSchema {
    RecordSchema::new("employee")
        .rule(FieldRule::mandatory("name"))
        .rule(FieldRule::mandatory("email"))
        .rule(FieldRule::mandatory("role").one_of(employee_role_domain()))
        .rule(FieldRule::mandatory("status").one_of(status_domain()))
        .rule(FieldRule::mandatory("createdAt"))
        .mutable(["status", "role"])
}

/// Every builtin kind.
pub fn builtin() -> Vec<RecordSchema> {
    vec![
        header(),
        consent(),
        entity(),
        scrub_token(),
        message_delivery(),
        template(),
        employee(),
    ]
}

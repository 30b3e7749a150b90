use std::collections::BTreeMap;

use idman_core::models::PrincipalType;
use idman_templates::models::{
    is_valid_account_id, parse_entity_reference, Template, TemplateAssignment, TemplateMetadata,
    TemplateTarget,
};

fn explicit_targets(ids: &[&str]) -> TemplateTarget {
    TemplateTarget {
        account_ids: Some(ids.iter().map(|s| s.to_string()).collect()),
        account_tags: None,
        exclude_accounts: None,
    }
}

fn sample_template() -> Template {
    Template {
        metadata: TemplateMetadata::new("developer-access"),
        assignments: vec![TemplateAssignment {
            entities: vec!["user:alice".to_string(), "group:devs".to_string()],
            permission_sets: vec!["DevAccess".to_string(), "ReadOnly".to_string()],
            targets: explicit_targets(&["123456789012", "234567890123"]),
        }],
    }
}

#[test]
fn targets_require_exactly_one_of_ids_or_tags() {
    assert!(TemplateTarget::default().validate().is_err());

    let both = TemplateTarget {
        account_ids: Some(vec!["123456789012".to_string()]),
        account_tags: Some(BTreeMap::from([(
            "Environment".to_string(),
            "dev".to_string(),
        )])),
        exclude_accounts: None,
    };
    assert!(both.validate().is_err());

    assert!(explicit_targets(&["123456789012"]).validate().is_ok());
}

// Two entities x two permission sets x two accounts = eight triples.
#[test]
fn cross_product_cardinality() {
    let template = sample_template();
    assert_eq!(template.total_assignments(), Some(8));
    assert_eq!(template.entity_count(), 2);
    assert_eq!(template.permission_set_count(), 2);
}

#[test]
fn tag_based_targets_have_no_static_count() {
    let mut template = sample_template();
    template.assignments[0].targets = TemplateTarget {
        account_ids: None,
        account_tags: Some(BTreeMap::from([(
            "Environment".to_string(),
            "dev".to_string(),
        )])),
        exclude_accounts: None,
    };
    assert_eq!(template.total_assignments(), None);
}

#[test]
fn structural_validation_collects_errors() {
    let mut template = sample_template();
    template.metadata.name = String::new();
    template.assignments[0].entities.clear();
    let errors = template.validate_structure();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("name"));
    assert!(errors[1].contains("entity"));
}

#[test]
fn entity_references_parse() {
    assert_eq!(
        parse_entity_reference("user:alice").unwrap(),
        (PrincipalType::User, "alice".to_string())
    );
    assert_eq!(
        parse_entity_reference("group:devs").unwrap(),
        (PrincipalType::Group, "devs".to_string())
    );
    assert!(parse_entity_reference("alice").is_err());
    assert!(parse_entity_reference("role:admin").is_err());
    assert!(parse_entity_reference("user:  ").is_err());
}

#[test]
fn account_id_format() {
    assert!(is_valid_account_id("123456789012"));
    assert!(!is_valid_account_id("12345678901"));
    assert!(!is_valid_account_id("12345678901x"));
}

#[test]
fn template_round_trips_through_yaml() {
    let template = sample_template();
    let yaml = idman_templates::parser::to_string(
        &template,
        idman_templates::parser::TemplateFormat::Yaml,
    )
    .unwrap();
    let parsed = idman_templates::parser::parse_str(
        &yaml,
        idman_templates::parser::TemplateFormat::Yaml,
    )
    .unwrap();
    assert_eq!(parsed.metadata.name, "developer-access");
    assert_eq!(parsed.assignments, template.assignments);
}

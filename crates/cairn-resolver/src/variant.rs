//! Total variant assignment for one package.
//!
//! Precedence, weakest first: declared default < assignment required by
//! the inbound dependency edge < user override (root package only).
//! Every supplied value is checked against the declaration; a value
//! outside an enumerated variant's allowed set, a non-boolean value for a
//! boolean variant, or an undeclared variant name is an
//! `InvalidVariantValue`.

use std::collections::BTreeMap;

use cairn_core::errors::{CairnError, CairnResult};
use cairn_core::recipe::{Package, Variant, VariantValue};

/// Compute the concrete assignment covering every declared variant.
pub fn resolve_variants(
    package: &Package,
    required: &BTreeMap<String, VariantValue>,
    overrides: &BTreeMap<String, VariantValue>,
) -> CairnResult<BTreeMap<String, VariantValue>> {
    let mut assignment: BTreeMap<String, VariantValue> = package
        .variants()
        .iter()
        .map(|(name, v)| (name.clone(), v.default.clone()))
        .collect();

    for source in [required, overrides] {
        for (name, value) in source {
            let variant = package.variants().get(name).ok_or_else(|| {
                CairnError::InvalidVariantValue {
                    package: package.name.clone(),
                    variant: name.clone(),
                    value: value.to_string(),
                    allowed: format!(
                        "no such variant (declared: {})",
                        declared_names(package)
                    ),
                }
            })?;
            check_value(package, variant, value)?;
            assignment.insert(name.clone(), value.clone());
        }
    }

    Ok(assignment)
}

fn check_value(package: &Package, variant: &Variant, value: &VariantValue) -> CairnResult<()> {
    let ok = match (&variant.default, value) {
        (VariantValue::Bool(_), VariantValue::Bool(_)) => true,
        (VariantValue::Choice(_), VariantValue::Choice(v)) => variant.values.contains(v),
        _ => false,
    };
    if ok {
        return Ok(());
    }
    let allowed = match &variant.default {
        VariantValue::Bool(_) => "allowed: true, false".to_string(),
        VariantValue::Choice(_) => format!("allowed: {}", variant.values.join(", ")),
    };
    Err(CairnError::InvalidVariantValue {
        package: package.name.clone(),
        variant: variant.name.clone(),
        value: value.to_string(),
        allowed,
    })
}

fn declared_names(package: &Package) -> String {
    let names: Vec<&str> = package.variants().keys().map(String::as_str).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Option mapping: client-supplied values onto a device's declared options.

use std::collections::HashMap;

use scanwerk_bridge::DeviceHandle;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{DeviceOption, OptionKind, OptionValue, RequestValue};
use tracing::{debug, instrument};

/// Apply every requested option to `handle`.
///
/// Options are applied one at a time in name order and the first failure
/// stops the run; anything applied before it stays applied. Options the
/// device declares read-only are skipped without error.
#[instrument(skip_all, fields(device = %handle.device_name(), count = requested.len()))]
pub fn apply_options(
    handle: &mut dyn DeviceHandle,
    requested: &HashMap<String, RequestValue>,
) -> Result<()> {
    let declared = handle.options();

    let mut names: Vec<&String> = requested.keys().collect();
    names.sort();

    for name in names {
        let value = &requested[name];
        let option = declared
            .iter()
            .find(|o| &o.name == name)
            .ok_or_else(|| ScanwerkError::UnknownOption(name.clone()))?;

        if !option.settable {
            debug!(option = %name, "option is read-only, skipping");
            continue;
        }

        let typed = coerce(option, value)?;
        debug!(option = %name, value = %typed, "setting option");
        handle.set_option(name, typed)?;
    }
    Ok(())
}

/// Convert a request value to the kind `option` declares.
///
/// Integers accept whole numbers and reals, which are truncated toward zero.
/// Reals accept both number forms. Booleans and strings must be given as
/// such.
pub fn coerce(option: &DeviceOption, value: &RequestValue) -> Result<OptionValue> {
    let mismatch = || ScanwerkError::Coercion {
        option: option.name.clone(),
        expected: option.kind,
        found: value.type_name(),
    };

    match (option.kind, value) {
        (OptionKind::Bool, RequestValue::Bool(b)) => Ok(OptionValue::Bool(*b)),
        (OptionKind::Int, RequestValue::Int(i)) => Ok(OptionValue::Int(*i)),
        (OptionKind::Int, RequestValue::Real(r)) => truncate(*r).map(OptionValue::Int).ok_or_else(mismatch),
        (OptionKind::Real, RequestValue::Int(i)) => Ok(OptionValue::Real(*i as f64)),
        (OptionKind::Real, RequestValue::Real(r)) => Ok(OptionValue::Real(*r)),
        (OptionKind::String, RequestValue::Text(s)) => Ok(OptionValue::Text(s.clone())),
        _ => Err(mismatch()),
    }
}

/// Truncate toward zero, refusing values no `i64` can hold.
fn truncate(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    let t = value.trunc();
    (t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
}

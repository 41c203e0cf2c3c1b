//! Unit Conversion Engine
//!
//! Composes basis multipliers into scale factors. A derived quantity is a
//! power law over base dimensions, so its factor is the product of each
//! base factor raised to its exponent (an area load is `force / length²`).
//!
//! Source and target never swap roles: the factor converts a magnitude
//! authored in the source units into the target units by multiplication.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Dimension, QuantityKind, UnitBasisRegistry, UnitQuantity, UnitSystem};
use crate::errors::{TransferError, TransferResult};

/// What to do when a unit label has no basis multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversionPolicy {
    /// Fail with [`TransferError::UnknownUnit`]. Required for any value
    /// written back to a model.
    #[default]
    Strict,
    /// Treat the factor as 1.0. Only for display strings.
    Permissive,
}

/// One factor of a power-law conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerTerm<'a> {
    pub dimension: Dimension,
    pub exponent: i32,
    pub source: &'a str,
    pub target: &'a str,
}

impl<'a> PowerTerm<'a> {
    pub fn new(dimension: Dimension, exponent: i32, source: &'a str, target: &'a str) -> Self {
        PowerTerm {
            dimension,
            exponent,
            source,
            target,
        }
    }
}

/// Scale factor engine over an injected [`UnitBasisRegistry`].
#[derive(Debug, Clone)]
pub struct UnitConverter {
    registry: Arc<UnitBasisRegistry>,
}

impl UnitConverter {
    pub fn new(registry: Arc<UnitBasisRegistry>) -> Self {
        UnitConverter { registry }
    }

    /// Converter over [`UnitBasisRegistry::standard`]
    pub fn standard() -> Self {
        UnitConverter::new(Arc::new(UnitBasisRegistry::standard()))
    }

    pub fn registry(&self) -> &UnitBasisRegistry {
        &self.registry
    }

    /// Strict factor converting `source` units into `target` units.
    ///
    /// # Example
    /// ```
    /// use loadset_core::units::{Dimension, UnitConverter};
    ///
    /// let converter = UnitConverter::standard();
    /// let factor = converter.scale_factor(Dimension::Length, "ft", "in").unwrap();
    /// assert!((factor - 12.0).abs() < 1e-12);
    /// ```
    pub fn scale_factor(&self, dimension: Dimension, source: &str, target: &str) -> TransferResult<f64> {
        self.scale_factor_with(dimension, source, target, ConversionPolicy::Strict)
    }

    /// Factor under an explicit policy
    pub fn scale_factor_with(
        &self,
        dimension: Dimension,
        source: &str,
        target: &str,
        policy: ConversionPolicy,
    ) -> TransferResult<f64> {
        let from = self.registry.lookup(dimension, source);
        let to = self.registry.lookup(dimension, target);

        match (from, to) {
            (Some(from), Some(to)) => {
                if to == 0.0 {
                    return Ok(1.0);
                }
                Ok(from / to)
            }
            _ => match policy {
                ConversionPolicy::Permissive => Ok(1.0),
                ConversionPolicy::Strict => {
                    let missing = if from.is_none() { source } else { target };
                    Err(TransferError::unknown_unit(dimension.name(), missing))
                }
            },
        }
    }

    /// Product of `factor(term)^exponent` over every term
    pub fn power_law_factor(&self, terms: &[PowerTerm<'_>], policy: ConversionPolicy) -> TransferResult<f64> {
        terms.iter().try_fold(1.0, |acc, term| {
            let factor = self.scale_factor_with(term.dimension, term.source, term.target, policy)?;
            Ok(acc * factor.powi(term.exponent))
        })
    }

    /// Strict factor for a force-per-area magnitude: `force / length²`.
    ///
    /// # Example
    /// ```
    /// use loadset_core::units::UnitConverter;
    ///
    /// let factor = UnitConverter::standard()
    ///     .area_load_scale_factor("N", "mm", "lb", "in")
    ///     .unwrap();
    /// assert!((factor - 145.0377).abs() < 1e-4);
    /// ```
    pub fn area_load_scale_factor(
        &self,
        source_force: &str,
        source_length: &str,
        target_force: &str,
        target_length: &str,
    ) -> TransferResult<f64> {
        self.power_law_factor(
            &[
                PowerTerm::new(Dimension::Force, 1, source_force, target_force),
                PowerTerm::new(Dimension::Length, -2, source_length, target_length),
            ],
            ConversionPolicy::Strict,
        )
    }

    /// Factor for any quantity kind between two unit systems
    pub fn quantity_scale_factor(
        &self,
        kind: QuantityKind,
        source: &UnitSystem,
        target: &UnitSystem,
        policy: ConversionPolicy,
    ) -> TransferResult<f64> {
        let terms: Vec<PowerTerm<'_>> = kind
            .terms()
            .iter()
            .map(|&(dimension, exponent)| {
                PowerTerm::new(dimension, exponent, source.label(dimension), target.label(dimension))
            })
            .collect();
        self.power_law_factor(&terms, policy)
    }

    /// Strictly convert a quantity into the target unit system
    pub fn convert(&self, quantity: &UnitQuantity, target: &UnitSystem) -> TransferResult<UnitQuantity> {
        let factor = self.quantity_scale_factor(quantity.kind(), quantity.system(), target, ConversionPolicy::Strict)?;
        Ok(UnitQuantity::new(quantity.magnitude() * factor, quantity.kind(), target))
    }
}

impl Default for UnitConverter {
    fn default() -> Self {
        UnitConverter::standard()
    }
}

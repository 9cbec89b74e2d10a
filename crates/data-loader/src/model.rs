//! The latent-factor model: factor matrices, bias vectors and the prediction
//! formula.
//!
//! Factors are stored row-major in one flat `Vec<f64>` per side; row `u` of
//! the user matrix is `user_factors[u * dim..(u + 1) * dim]`.

use crate::error::{DataLoadError, LookupError, Result};
use crate::id_map::IdentifierMap;
use crate::types::EntityKind;

/// Immutable matrix-factorization model
#[derive(Debug, Clone, PartialEq)]
pub struct LatentFactorModel {
    dim: usize,
    user_factors: Vec<f64>,
    item_factors: Vec<f64>,
    user_bias: Vec<f64>,
    item_bias: Vec<f64>,
    global_bias: f64,
}

impl LatentFactorModel {
    /// Build a model from one factor vector per user and per item.
    ///
    /// Fails with `MalformedModel` if rows are ragged, if user and item
    /// factors disagree on dimensionality, if a bias vector does not have one
    /// entry per row, or if any value is not finite.
    pub fn new(
        user_factors: Vec<Vec<f64>>,
        item_factors: Vec<Vec<f64>>,
        user_bias: Vec<f64>,
        item_bias: Vec<f64>,
        global_bias: f64,
    ) -> Result<Self> {
        let user_dim = row_dim(&user_factors, EntityKind::User)?;
        let item_dim = row_dim(&item_factors, EntityKind::Item)?;

        let dim = match (user_dim, item_dim) {
            (Some(u), Some(i)) if u != i => {
                return Err(DataLoadError::MalformedModel(format!(
                    "user factors have dimension {u} but item factors have dimension {i}"
                )));
            }
            (Some(d), _) | (None, Some(d)) => d,
            (None, None) => 0,
        };

        Self::from_flat(
            dim,
            user_factors.into_iter().flatten().collect(),
            item_factors.into_iter().flatten().collect(),
            user_bias,
            item_bias,
            global_bias,
        )
    }

    /// Build a model from row-major flattened factor matrices of width `dim`
    pub fn from_flat(
        dim: usize,
        user_factors: Vec<f64>,
        item_factors: Vec<f64>,
        user_bias: Vec<f64>,
        item_bias: Vec<f64>,
        global_bias: f64,
    ) -> Result<Self> {
        let num_users = rows_for(dim, user_factors.len(), &user_bias, EntityKind::User)?;
        let num_items = rows_for(dim, item_factors.len(), &item_bias, EntityKind::Item)?;

        if user_bias.len() != num_users {
            return Err(DataLoadError::MalformedModel(format!(
                "{} user bias terms for {} user factor rows",
                user_bias.len(),
                num_users
            )));
        }
        if item_bias.len() != num_items {
            return Err(DataLoadError::MalformedModel(format!(
                "{} item bias terms for {} item factor rows",
                item_bias.len(),
                num_items
            )));
        }

        let all_finite = global_bias.is_finite()
            && [&user_factors, &item_factors, &user_bias, &item_bias]
                .iter()
                .all(|values| values.iter().all(|v| v.is_finite()));
        if !all_finite {
            return Err(DataLoadError::MalformedModel(
                "model contains NaN or infinite values".to_string(),
            ));
        }

        Ok(Self {
            dim,
            user_factors,
            item_factors,
            user_bias,
            item_bias,
            global_bias,
        })
    }

    /// Shared latent dimensionality `k`
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_users(&self) -> usize {
        self.user_bias.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_bias.len()
    }

    pub fn global_bias(&self) -> f64 {
        self.global_bias
    }

    pub fn user_vector(&self, user_idx: usize) -> std::result::Result<&[f64], LookupError> {
        check_index(EntityKind::User, user_idx, self.num_users())?;
        Ok(&self.user_factors[user_idx * self.dim..(user_idx + 1) * self.dim])
    }

    pub fn item_vector(&self, item_idx: usize) -> std::result::Result<&[f64], LookupError> {
        check_index(EntityKind::Item, item_idx, self.num_items())?;
        Ok(&self.item_factors[item_idx * self.dim..(item_idx + 1) * self.dim])
    }

    /// Predicted affinity of user `user_idx` for item `item_idx`:
    ///
    /// ```text
    /// global_bias + user_bias[u] + item_bias[i] + dot(user_factors[u], item_factors[i])
    /// ```
    ///
    /// Terms are added left to right and the dot product is accumulated in
    /// factor order, so the result is reproducible bit for bit.
    pub fn predict(&self, user_idx: usize, item_idx: usize) -> std::result::Result<f64, LookupError> {
        self.breakdown(user_idx, item_idx).map(|terms| terms.total())
    }

    /// The individual terms `predict` sums
    pub fn breakdown(
        &self,
        user_idx: usize,
        item_idx: usize,
    ) -> std::result::Result<ScoreBreakdown, LookupError> {
        let user = self.user_vector(user_idx)?;
        let item = self.item_vector(item_idx)?;
        Ok(ScoreBreakdown {
            global_bias: self.global_bias,
            user_bias: self.user_bias[user_idx],
            item_bias: self.item_bias[item_idx],
            interaction: dot(user, item),
        })
    }

    /// Verify the identifier maps address exactly the loaded rows
    pub fn check_against(&self, users: &IdentifierMap, items: &IdentifierMap) -> Result<()> {
        if users.len() != self.num_users() {
            return Err(DataLoadError::MalformedModel(format!(
                "user map has {} ids but the model has {} user rows",
                users.len(),
                self.num_users()
            )));
        }
        if items.len() != self.num_items() {
            return Err(DataLoadError::MalformedModel(format!(
                "item map has {} ids but the model has {} item rows",
                items.len(),
                self.num_items()
            )));
        }
        Ok(())
    }
}

/// One prediction split into its terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub global_bias: f64,
    pub user_bias: f64,
    pub item_bias: f64,
    /// Dot product of the user and item factor vectors
    pub interaction: f64,
}

impl ScoreBreakdown {
    /// Sum of the terms, added left to right
    pub fn total(&self) -> f64 {
        self.global_bias + self.user_bias + self.item_bias + self.interaction
    }
}

/// Inner product accumulated in index order
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| acc + x * y)
}

fn row_dim(rows: &[Vec<f64>], kind: EntityKind) -> Result<Option<usize>> {
    let Some(first) = rows.first() else {
        return Ok(None);
    };
    let dim = first.len();
    if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
        return Err(DataLoadError::MalformedModel(format!(
            "{kind} factor row {row} has length {} (expected {dim})",
            bad.len()
        )));
    }
    Ok(Some(dim))
}

/// Number of rows in a flattened matrix.
///
/// With `dim == 0` the matrix carries no row information, so the bias vector
/// decides how many rows there are.
fn rows_for(dim: usize, flat_len: usize, bias: &[f64], kind: EntityKind) -> Result<usize> {
    if dim == 0 {
        if flat_len != 0 {
            return Err(DataLoadError::MalformedModel(format!(
                "{kind} factors have {flat_len} values but dimension 0"
            )));
        }
        return Ok(bias.len());
    }
    if flat_len % dim != 0 {
        return Err(DataLoadError::MalformedModel(format!(
            "{kind} factors have {flat_len} values, not a multiple of dimension {dim}"
        )));
    }
    Ok(flat_len / dim)
}

fn check_index(kind: EntityKind, index: usize, len: usize) -> std::result::Result<(), LookupError> {
    if index < len {
        Ok(())
    } else {
        Err(LookupError::IndexOutOfRange { kind, index, len })
    }
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RolloutError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Conflict while updating {0}")]
    Conflict(String),

    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl RolloutError {
    /// Map a failed write to a conflict when the object changed underneath us
    pub fn from_write(err: kube::Error, target: &str) -> Self {
        if is_conflict(&err) {
            RolloutError::Conflict(target.to_string())
        } else {
            RolloutError::KubeError(err)
        }
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            RolloutError::Conflict(_) => true,
            RolloutError::KubeError(err) => is_conflict(err),
            RolloutError::InvalidObject(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RolloutError::KubeError(err) if is_not_found(err))
    }
}

pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

pub type Result<T> = std::result::Result<T, RolloutError>;

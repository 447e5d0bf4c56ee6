//! Derived, read-only views over the resource store.

use crate::duration;
use crate::store::{LoadState, ResourceStore};
use crate::types::{ActiveGrant, Code, VipPackage};

/// Label shown for a grant whose package no longer exists.
pub const MISSING_PACKAGE_LABEL: &str = "—";

/// What the editor as a whole is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// Session check or initial snapshot still running
    Loading,
    Ready,
    /// The uid has no backend session; nothing else is rendered
    NoSession { reason: String },
}

/// An active grant joined with the package it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantRow<'a> {
    pub grant: &'a ActiveGrant,
    pub package: Option<&'a VipPackage>,
}

impl GrantRow<'_> {
    pub fn package_label(&self) -> String {
        self.package
            .map(VipPackage::plain_display_name)
            .unwrap_or_else(|| MISSING_PACKAGE_LABEL.to_string())
    }

    pub fn remaining(&self) -> String {
        duration::format(self.grant.duration)
    }
}

/// The paged codes table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodesView<'a> {
    /// Codes were never requested
    Unloaded,
    /// A reload or re-fetch is in progress
    Loading,
    Failed(&'a str),
    Loaded {
        rows: Vec<&'a Code>,
        /// Matches before windowing
        matching: usize,
        has_more: bool,
    },
}

fn matches_any(needle: &str, fields: &[&str]) -> bool {
    needle.is_empty() || fields.iter().any(|field| field.to_lowercase().contains(needle))
}

fn needle(search: &str) -> String {
    search.trim().to_lowercase()
}

/// Packages matching `search`, highest priority first. Ties keep store order.
pub fn packages<'a>(packages: &'a [VipPackage], search: &str) -> Vec<&'a VipPackage> {
    let needle = needle(search);
    let mut rows: Vec<_> = packages
        .iter()
        .filter(|p| matches_any(&needle, &[p.name.as_str(), p.plain_display_name().as_str(), p.group.as_str()]))
        .collect();
    rows.sort_by(|a, b| b.priority.cmp(&a.priority));
    rows
}

/// Unexpired grants matching `search`.
pub fn grants<'a>(store: &'a ResourceStore, search: &str) -> Vec<GrantRow<'a>> {
    let needle = needle(search);
    store
        .grants
        .iter()
        .filter(|grant| !grant.is_expired())
        .map(|grant| GrantRow {
            grant,
            package: store.package_for(grant),
        })
        .filter(|row| {
            matches_any(
                &needle,
                &[
                    row.grant.player_name.as_str(),
                    row.grant.player_unique_id.as_str(),
                    row.grant.package_name.as_str(),
                    row.package_label().as_str(),
                ],
            )
        })
        .collect()
}

/// The first `window` codes matching `search`.
pub fn codes<'a>(store: &'a ResourceStore, search: &str, window: usize) -> CodesView<'a> {
    if store.is_scraping(crate::types::ResourceKind::Codes) {
        return CodesView::Loading;
    }
    match store.codes.state() {
        LoadState::Unloaded => CodesView::Unloaded,
        LoadState::Loading => CodesView::Loading,
        LoadState::Failed(message) => CodesView::Failed(message),
        LoadState::Loaded => {
            let needle = needle(search);
            let matching: Vec<&Code> = store
                .codes
                .iter()
                .filter(|code| {
                    matches_any(
                        &needle,
                        &[
                            code.code.as_str(),
                            code.identifier.as_str(),
                            code.code_type.to_string().as_str(),
                            code.used_by.as_deref().unwrap_or_default(),
                            code.email.as_deref().unwrap_or_default(),
                        ],
                    )
                })
                .collect();
            let total = matching.len();
            let rows: Vec<&Code> = matching.into_iter().take(window).collect();
            CodesView::Loaded {
                has_more: total > rows.len(),
                rows,
                matching: total,
            }
        }
    }
}

// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Utilities for deriving stable slugs from dashboard titles.
//!
//! Slugs produced by this module contain only lowercase ASCII alphanumeric
//! characters separated by single hyphens, making them suitable for the
//! generated file names and the relative imports that reference them.

/// Placeholder slug used when a title has no slug-worthy characters.
pub const DEFAULT_SLUG: &str = "dashboard";

/// Builder for slug strings derived from human-readable titles.
#[derive(Debug, Clone, Copy)]
pub struct SlugStrategy<'input> {
    source: &'input str
}

impl<'input> SlugStrategy<'input> {
    /// Creates a new slug builder for the provided string slice.
    ///
    /// The builder retains a borrowed view of the source to avoid allocations
    /// until [`build`](Self::build) is invoked.
    pub fn builder(source: &'input str) -> Self {
        Self {
            source
        }
    }

    /// Builds a slug from the source string.
    ///
    /// Characters are lowercased first; every run of characters outside
    /// `[a-z0-9]` collapses into a single hyphen. Returns `None` when nothing
    /// slug-worthy remains.
    ///
    /// # Examples
    ///
    /// ```
    /// use grafonnet_scaffold::SlugStrategy;
    ///
    /// let slug = SlugStrategy::builder(" API / Overview  ").build();
    /// assert_eq!(slug.as_deref(), Some("api-overview"));
    /// ```
    pub fn build(self) -> Option<String> {
        let trimmed = self.source.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut slug = String::with_capacity(trimmed.len());
        let mut previous_hyphen = false;

        for candidate in trimmed.chars().flat_map(char::to_lowercase) {
            match candidate {
                'a'..='z' | '0'..='9' => {
                    slug.push(candidate);
                    previous_hyphen = false;
                }
                _ => {
                    if !previous_hyphen && !slug.is_empty() {
                        slug.push('-');
                        previous_hyphen = true;
                    }
                }
            }
        }

        while slug.ends_with('-') {
            slug.pop();
        }

        if slug.is_empty() { None } else { Some(slug) }
    }

    /// Builds a slug, falling back to [`DEFAULT_SLUG`] for degenerate input.
    ///
    /// # Examples
    ///
    /// ```
    /// use grafonnet_scaffold::SlugStrategy;
    ///
    /// assert_eq!(SlugStrategy::builder("Checkout Service").build_or_default(), "checkout-service");
    /// assert_eq!(SlugStrategy::builder("***").build_or_default(), "dashboard");
    /// ```
    pub fn build_or_default(self) -> String {
        self.build().unwrap_or_else(|| DEFAULT_SLUG.to_owned())
    }
}

//! Attribute comparison policies and the file comparator built on them

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::attributes::{BasicAttributes, ContentHasher, FileAttributes};
use crate::config::ScanOptions;
use crate::error::Result;

/// How thoroughly two attribute snapshots are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonPolicy {
    /// Stop at the first mismatching category
    #[default]
    Quick,
    /// Evaluate every category
    Comprehensive,
}

/// Which optional attribute categories take part in a comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComparisonFlags {
    /// Last-access and last-modified times. Creation time never takes part.
    pub include_timestamps: bool,
    /// POSIX, file-owner and ACL attributes
    pub include_advanced: bool,
}

/// Compares two attribute snapshots category by category
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeComparator {
    policy: ComparisonPolicy,
}

impl AttributeComparator {
    pub fn new(policy: ComparisonPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ComparisonPolicy {
        self.policy
    }

    /// Whether the two snapshots match under this comparator's policy
    pub fn compare(
        &self,
        first: &FileAttributes,
        second: &FileAttributes,
        flags: ComparisonFlags,
    ) -> bool {
        let mut categories = vec![Category::Basic, Category::Dos];
        if flags.include_advanced {
            categories.extend([Category::Posix, Category::FileOwner, Category::Acl]);
        }

        let mut outcomes = categories.into_iter().map(|category| {
            let matched = category.matches(first, second, flags);
            if !matched {
                debug!("The {} attributes do not match", category.name());
            }
            matched
        });

        match self.policy {
            ComparisonPolicy::Quick => outcomes.all(|matched| matched),
            ComparisonPolicy::Comprehensive => {
                outcomes.fold(true, |all_matched, matched| all_matched && matched)
            }
        }
    }
}

/// Attribute categories, in quick-policy evaluation order
#[derive(Debug, Clone, Copy)]
enum Category {
    Basic,
    Dos,
    Posix,
    FileOwner,
    Acl,
}

impl Category {
    fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Dos => "DOS",
            Self::Posix => "POSIX",
            Self::FileOwner => "file-owner",
            Self::Acl => "ACL",
        }
    }

    fn matches(
        &self,
        first: &FileAttributes,
        second: &FileAttributes,
        flags: ComparisonFlags,
    ) -> bool {
        match self {
            Self::Basic => compare_category(first.basic.as_ref(), second.basic.as_ref(), |a, b| {
                basic_match(a, b, flags.include_timestamps)
            }),
            Self::Dos => compare_category(first.dos.as_ref(), second.dos.as_ref(), |a, b| a == b),
            Self::Posix => {
                compare_category(first.posix.as_ref(), second.posix.as_ref(), |a, b| a == b)
            }
            Self::FileOwner => {
                compare_category(first.file_owner.as_ref(), second.file_owner.as_ref(), |a, b| a == b)
            }
            Self::Acl => compare_category(
                first.acl_description.as_ref(),
                second.acl_description.as_ref(),
                |a, b| a == b,
            ),
        }
    }
}

/// Unreadable on both sides counts as equal, on one side as a mismatch
fn compare_category<T>(
    first: Option<&T>,
    second: Option<&T>,
    matches: impl Fn(&T, &T) -> bool,
) -> bool {
    match (first, second) {
        (None, None) => true,
        (Some(a), Some(b)) => matches(a, b),
        _ => false,
    }
}

fn basic_match(
    first: &BasicAttributes,
    second: &BasicAttributes,
    include_timestamps: bool,
) -> bool {
    if first.is_directory != second.is_directory
        || first.is_other != second.is_other
        || first.is_regular_file != second.is_regular_file
        || first.is_symbolic_link != second.is_symbolic_link
    {
        return false;
    }

    if include_timestamps
        && (first.last_access != second.last_access || first.last_modified != second.last_modified)
    {
        return false;
    }

    first.size == second.size
}

/// Decides whether two regular files are equal: attributes plus content hash
#[derive(Debug, Clone, Copy, Default)]
pub struct FileComparator {
    attributes: AttributeComparator,
    hasher: ContentHasher,
}

impl FileComparator {
    pub fn new(policy: ComparisonPolicy, hasher: ContentHasher) -> Self {
        Self {
            attributes: AttributeComparator::new(policy),
            hasher,
        }
    }

    /// Quick by default, comprehensive for deep scans
    pub fn from_options(options: &ScanOptions) -> Self {
        let policy = if options.deep_scan {
            ComparisonPolicy::Comprehensive
        } else {
            ComparisonPolicy::Quick
        };
        Self::new(policy, ContentHasher::new(options.hash_algorithm))
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn policy(&self) -> ComparisonPolicy {
        self.attributes.policy()
    }

    /// Compare two files. Errors reading either file's content are returned.
    pub fn compare(&self, source: &Path, target: &Path, flags: ComparisonFlags) -> Result<bool> {
        let source_attributes = FileAttributes::capture(source, None);
        let target_attributes = FileAttributes::capture(target, None);
        let attributes_match = self
            .attributes
            .compare(&source_attributes, &target_attributes, flags);

        match self.attributes.policy() {
            ComparisonPolicy::Quick => {
                if !attributes_match {
                    return Ok(false);
                }
                self.contents_match(source, target)
            }
            ComparisonPolicy::Comprehensive => {
                let contents_match = self.contents_match(source, target)?;
                Ok(attributes_match && contents_match)
            }
        }
    }

    fn contents_match(&self, source: &Path, target: &Path) -> Result<bool> {
        let source_hash = self.hasher.hash_file(source)?;
        let target_hash = self.hasher.hash_file(target)?;
        if source_hash != target_hash {
            debug!("Contents of {} and {} differ", source.display(), target.display());
        }
        Ok(source_hash == target_hash)
    }
}

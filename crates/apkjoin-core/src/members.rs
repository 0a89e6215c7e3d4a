//! The ordered, classified member set.

use apkjoin_schema::{Confidence, PackageMember, Role};

use crate::validate::ValidationError;

/// Classified members in canonical order: base first, then by split name,
/// ties broken by file name.
#[derive(Debug, Clone, Default)]
pub struct MemberSet {
    members: Vec<PackageMember>,
    warnings: Vec<String>,
}

impl MemberSet {
    /// Order `members` canonically, settling competing base candidates.
    ///
    /// When several members classify as base and exactly one of them did so
    /// with better than [`Confidence::Fallback`], the fallback ones are
    /// demoted to splits named after their file stem.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AmbiguousBase`] when the base cannot be
    /// settled that way.
    pub fn new(mut members: Vec<PackageMember>) -> Result<Self, ValidationError> {
        let mut warnings = Vec::new();

        let bases: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_base())
            .map(|(i, _)| i)
            .collect();

        if bases.len() > 1 {
            let confident = bases
                .iter()
                .filter(|&&i| members[i].confidence.is_confident())
                .count();
            if confident != 1 {
                return Err(ValidationError::AmbiguousBase {
                    candidates: bases.iter().map(|&i| members[i].file_name.clone()).collect(),
                });
            }
            for &i in &bases {
                let member = &mut members[i];
                if member.confidence != Confidence::Fallback {
                    continue;
                }
                member.role = Role::Split;
                member.split_name = member.stem().to_string();
                let msg = format!(
                    "{} looked like a base by default only; treating it as split '{}'",
                    member.file_name, member.split_name
                );
                tracing::warn!("{msg}");
                member.warnings.push(msg.clone());
                warnings.push(msg);
            }
        }

        members.sort_by(|a, b| {
            (!a.is_base(), &a.split_name, &a.file_name).cmp(&(!b.is_base(), &b.split_name, &b.file_name))
        });

        Ok(Self { members, warnings })
    }

    /// The base member, if the set has one.
    pub fn base(&self) -> Option<&PackageMember> {
        self.members.first().filter(|m| m.is_base())
    }

    /// Every member that is not the base, in canonical order.
    pub fn non_base(&self) -> impl Iterator<Item = &PackageMember> {
        self.members.iter().filter(|m| !m.is_base())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageMember> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Demotions made while settling the base.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn into_members(self) -> Vec<PackageMember> {
        self.members
    }
}

impl<'a> IntoIterator for &'a MemberSet {
    type Item = &'a PackageMember;
    type IntoIter = std::slice::Iter<'a, PackageMember>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

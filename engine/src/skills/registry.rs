//! Skill Registry
//!
//! Static mapping from skill id to its endpoint and app id. Built once from
//! config and shared read-only, so lookups need no locking.

use sdk::errors::HostError;
use std::collections::HashMap;

use crate::config::SkillConfig;

/// A configured child skill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillDescriptor {
    pub id: String,
    pub endpoint: String,
    pub app_id: String,
}

/// Read-only skill lookup
#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: HashMap<String, SkillDescriptor>,
    // preserves config order for listing
    order: Vec<String>,
}

impl SkillRegistry {
    /// Build the registry from the `[[skills]]` config tables
    ///
    /// # Errors
    ///
    /// Returns `HostError::Config` on duplicate ids.
    pub fn from_config(skills: &[SkillConfig]) -> Result<Self, HostError> {
        let mut registry = Self::default();
        for skill in skills {
            registry.insert(SkillDescriptor {
                id: skill.id.clone(),
                endpoint: skill.skill_endpoint.clone(),
                app_id: skill.app_id.clone(),
            })?;
        }
        Ok(registry)
    }

    fn insert(&mut self, descriptor: SkillDescriptor) -> Result<(), HostError> {
        if self.skills.contains_key(&descriptor.id) {
            return Err(HostError::Config(format!(
                "Duplicate skill id '{}'",
                descriptor.id
            )));
        }
        self.order.push(descriptor.id.clone());
        self.skills.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Look up a skill by id
    ///
    /// A miss is a routing error for the current turn.
    pub fn get(&self, skill_id: &str) -> Result<&SkillDescriptor, HostError> {
        self.skills
            .get(skill_id)
            .ok_or_else(|| HostError::Routing(skill_id.to_string()))
    }

    pub fn contains(&self, skill_id: &str) -> bool {
        self.skills.contains_key(skill_id)
    }

    /// All skills in configuration order
    pub fn list(&self) -> Vec<&SkillDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.skills.get(id))
            .collect()
    }

    /// Non-empty app ids of the configured skills
    pub fn app_ids(&self) -> impl Iterator<Item = &str> {
        self.skills
            .values()
            .map(|s| s.app_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

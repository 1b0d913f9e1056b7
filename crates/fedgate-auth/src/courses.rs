//! Course and course-role mapping.
//!
//! A [`CourseMapper`] turns the course claims of an assertion into local
//! courses and roles. Its output is only carried forward as state for later
//! enrollment; the pipeline itself consumes `any_course_active` for
//! authorization and files `errors` under the `course_enrollment` category.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::assertion::PrincipalIdentity;
use crate::config::{CourseEntry, CourseTableConfig};
use crate::roles::RoleMappingTable;

/// A course the principal is to be enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedCourse {
    /// Local course short-name.
    pub course: String,
    /// Local course role.
    pub role: String,
    /// Whether the course accepts enrollments.
    pub active: bool,
}

/// Output of a course mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseMapping {
    /// Mapped courses.
    pub courses: Vec<MappedCourse>,
    /// Distinct local roles across the mapped courses.
    pub roles: Vec<String>,
    /// Whether at least one mapped course is active.
    pub any_course_active: bool,
    /// Problems found while mapping, reported as course enrollment errors.
    pub errors: Vec<String>,
}

/// Maps course claims to local courses.
#[async_trait]
pub trait CourseMapper: Send + Sync {
    /// Maps the course claims of a principal.
    async fn map_courses(&self, username: &PrincipalIdentity, claims: &[String]) -> CourseMapping;
}

/// Maps claims of the form `<course-id><separator><role-claim>` through a
/// static course table and the role mapping table.
///
/// A claim without a separator enrolls with the default role.
#[derive(Debug, Clone)]
pub struct TableCourseMapper {
    courses: IndexMap<String, CourseEntry>,
    roles: RoleMappingTable,
    separator: String,
    default_role: String,
}

impl TableCourseMapper {
    /// Creates a mapper from the course table configuration.
    #[must_use]
    pub fn new(config: &CourseTableConfig, roles: RoleMappingTable) -> Self {
        Self {
            courses: config.mapping.clone(),
            roles,
            separator: config.separator.clone(),
            default_role: config.default_role.clone(),
        }
    }

    fn split_claim<'a>(&self, claim: &'a str) -> (&'a str, Option<&'a str>) {
        match claim.rsplit_once(self.separator.as_str()) {
            Some((course, role)) => (course.trim(), Some(role.trim())),
            None => (claim.trim(), None),
        }
    }
}

#[async_trait]
impl CourseMapper for TableCourseMapper {
    async fn map_courses(&self, username: &PrincipalIdentity, claims: &[String]) -> CourseMapping {
        let mut mapping = CourseMapping::default();

        for claim in claims {
            let (course_id, role_claim) = self.split_claim(claim);

            let Some(entry) = self.courses.get(course_id) else {
                mapping
                    .errors
                    .push(format!("Course '{course_id}' of user '{username}' is not mapped"));
                continue;
            };

            let role = match role_claim {
                None => self.default_role.clone(),
                Some(role_claim) => match self.roles.roles_for_claim(role_claim).next() {
                    Some(role) => role.to_string(),
                    None => {
                        mapping.errors.push(format!(
                            "Role '{role_claim}' of user '{username}' in course '{}' is not mapped",
                            entry.course
                        ));
                        continue;
                    }
                },
            };

            if !mapping.roles.contains(&role) {
                mapping.roles.push(role.clone());
            }
            mapping.any_course_active |= entry.active;
            mapping.courses.push(MappedCourse {
                course: entry.course.clone(),
                role,
                active: entry.active,
            });
        }

        debug!(
            %username,
            courses = mapping.courses.len(),
            active = mapping.any_course_active,
            errors = mapping.errors.len(),
            "Mapped course claims"
        );
        mapping
    }
}

//! Static route classification.
//!
//! Every inbound path maps to exactly one class. The table is an ordered
//! rule list with first-match-wins semantics and is validated when it is
//! built: a rule set that cannot classify some path, or that lets the login
//! entry point overlap a protected area, is rejected before the server
//! starts taking requests.

use crate::identity::AuthError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteClass {
    /// No identity check at all; the identity service is never consulted.
    Public,
    /// Requires a resolved identity; otherwise redirect to login.
    Protected,
    /// The login form; an authenticated caller is sent to the dashboard.
    AuthEntry,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    /// Matches the base path itself and everything below it.
    Prefix(String),
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        match raw.strip_suffix("/*") {
            Some(base) if !base.is_empty() => Self::Prefix(base.to_string()),
            // A bare "/*" is the catch-all.
            Some(_) => Self::Prefix("/".to_string()),
            None => Self::Exact(raw.to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(base) if base == "/" => true,
            Self::Prefix(base) => {
                path == base || path.strip_prefix(base.as_str()).is_some_and(|rest| {
                    rest.starts_with('/')
                })
            }
        }
    }

    /// A concrete path this pattern matches, used for overlap validation.
    fn representative(&self) -> &str {
        match self {
            Self::Exact(exact) => exact,
            Self::Prefix(base) => base,
        }
    }

    fn is_catch_all(&self) -> bool {
        matches!(self, Self::Prefix(base) if base == "/")
    }
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    rules: Vec<(Pattern, RouteClass)>,
}

impl RouteTable {
    /// Build a table from ordered `(pattern, class)` rules.
    ///
    /// Patterns are exact paths, or prefixes written with a trailing `/*`.
    ///
    /// # Errors
    /// `MisconfiguredRoute` when the rule set has no trailing catch-all
    /// (some path would be unclassifiable), contains duplicate patterns, or
    /// classifies an auth-entry path inside a protected area.
    pub fn new(rules: Vec<(&str, RouteClass)>) -> Result<Self, AuthError> {
        let rules: Vec<(Pattern, RouteClass)> = rules
            .into_iter()
            .map(|(raw, class)| (Pattern::parse(raw), class))
            .collect();

        let Some((last, _)) = rules.last() else {
            return Err(AuthError::MisconfiguredRoute(
                "empty rule set".to_string(),
            ));
        };
        if !last.is_catch_all() {
            return Err(AuthError::MisconfiguredRoute(
                "rule set must end with a catch-all (\"/*\")".to_string(),
            ));
        }

        for (index, (pattern, class)) in rules.iter().enumerate() {
            for (earlier, earlier_class) in &rules[..index] {
                if earlier == pattern {
                    return Err(AuthError::MisconfiguredRoute(format!(
                        "duplicate pattern for {}",
                        pattern.representative()
                    )));
                }
                // Auth entry and protected must stay mutually exclusive:
                // a later rule shadowed by an earlier one of the other
                // class means the same path would carry both intents.
                let conflicting = matches!(
                    (earlier_class, class),
                    (RouteClass::Protected, RouteClass::AuthEntry)
                        | (RouteClass::AuthEntry, RouteClass::Protected)
                );
                if conflicting && earlier.matches(pattern.representative()) {
                    return Err(AuthError::MisconfiguredRoute(format!(
                        "{} is shadowed by a conflicting rule",
                        pattern.representative()
                    )));
                }
            }
        }

        Ok(Self { rules })
    }

    /// The admin back-office contract: the login form is the auth entry,
    /// the dashboard subtree is protected, everything else is public.
    ///
    /// # Errors
    /// Never fails for this built-in rule set; the `Result` keeps the
    /// startup path uniform with custom tables.
    pub fn admin_defaults() -> Result<Self, AuthError> {
        Self::new(vec![
            ("/admin/login", RouteClass::AuthEntry),
            ("/admin/dashboard/*", RouteClass::Protected),
            ("/*", RouteClass::Public),
        ])
    }

    /// Classify a request path. Total by construction.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        for (pattern, class) in &self.rules {
            if pattern.matches(path) {
                return *class;
            }
        }
        // Unreachable: validation guarantees a trailing catch-all.
        RouteClass::Public
    }
}

#[cfg(test)]
mod tests {
    use super::{RouteClass, RouteTable};
    use crate::identity::AuthError;

    #[test]
    fn admin_defaults_classify_the_contract_paths() {
        let table = RouteTable::admin_defaults().unwrap();
        assert_eq!(table.classify("/admin/login"), RouteClass::AuthEntry);
        assert_eq!(table.classify("/admin/dashboard"), RouteClass::Protected);
        assert_eq!(
            table.classify("/admin/dashboard/leads/42"),
            RouteClass::Protected
        );
        assert_eq!(table.classify("/"), RouteClass::Public);
        assert_eq!(table.classify("/client/request"), RouteClass::Public);
        assert_eq!(table.classify("/admin/session"), RouteClass::Public);
    }

    #[test]
    fn prefix_does_not_match_sibling_paths() {
        let table = RouteTable::admin_defaults().unwrap();
        assert_eq!(table.classify("/admin/dashboardish"), RouteClass::Public);
    }

    #[test]
    fn missing_catch_all_is_rejected() {
        let err = RouteTable::new(vec![("/admin/login", RouteClass::AuthEntry)]).unwrap_err();
        assert!(matches!(err, AuthError::MisconfiguredRoute(_)));
    }

    #[test]
    fn empty_rule_set_is_rejected() {
        assert!(RouteTable::new(vec![]).is_err());
    }

    #[test]
    fn duplicate_patterns_are_rejected() {
        let err = RouteTable::new(vec![
            ("/admin/login", RouteClass::AuthEntry),
            ("/admin/login", RouteClass::Public),
            ("/*", RouteClass::Public),
        ])
        .unwrap_err();
        assert!(matches!(err, AuthError::MisconfiguredRoute(_)));
    }

    #[test]
    fn auth_entry_inside_protected_area_is_rejected() {
        let err = RouteTable::new(vec![
            ("/admin/dashboard/*", RouteClass::Protected),
            ("/admin/dashboard/login", RouteClass::AuthEntry),
            ("/*", RouteClass::Public),
        ])
        .unwrap_err();
        assert!(matches!(err, AuthError::MisconfiguredRoute(_)));
    }

    #[test]
    fn first_match_wins_over_later_rules() {
        let table = RouteTable::new(vec![
            ("/admin/login", RouteClass::AuthEntry),
            ("/admin/*", RouteClass::Protected),
            ("/*", RouteClass::Public),
        ])
        .unwrap();
        assert_eq!(table.classify("/admin/login"), RouteClass::AuthEntry);
        assert_eq!(table.classify("/admin/anything"), RouteClass::Protected);
    }
}

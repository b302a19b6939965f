//! Route descriptors.

use serde::Serialize;

/// A navigable unit: the URL slug and the component name derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    pub name: String,
    pub pascal_name: String,
}

impl RouteDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let pascal_name = to_pascal_case(&name);
        Self { name, pascal_name }
    }
}

/// `user-profile` / `user_profile` / `user profile` -> `UserProfile`.
pub fn to_pascal_case(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect()
}

/// Markup used when a route has no template of its own.
pub fn default_template(route: &str) -> String {
    format!(r#"<div class="route-{route}"><h1>Route: {route}</h1></div>"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("home"), "Home");
        assert_eq!(to_pascal_case("user-profile"), "UserProfile");
        assert_eq!(to_pascal_case("ADMIN_users list"), "AdminUsersList");
        assert_eq!(to_pascal_case("a--b"), "AB");
    }

    #[test]
    fn test_descriptor() {
        let route = RouteDescriptor::new("order-history");
        assert_eq!(route.name, "order-history");
        assert_eq!(route.pascal_name, "OrderHistory");
    }

    #[test]
    fn test_default_template() {
        assert_eq!(
            default_template("about"),
            r#"<div class="route-about"><h1>Route: about</h1></div>"#
        );
    }
}

// src/utils/robots.rs
use url::Url;

/// Parsed robots.txt directives
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
    policy: Policy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Policy {
    #[default]
    Rules,
    AllowAll,
    DisallowAll,
}

#[derive(Debug, Clone, Default)]
struct RuleGroup {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
struct Rule {
    path: String,
    allow: bool,
}

impl RobotsRules {
    /// Rules for a site whose robots.txt could not be read
    pub fn allow_all() -> Self {
        Self { groups: Vec::new(), policy: Policy::AllowAll }
    }

    /// Rules for a site that answered robots.txt with 401/403
    pub fn disallow_all() -> Self {
        Self { groups: Vec::new(), policy: Policy::DisallowAll }
    }

    /// Parse the body of a robots.txt file
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut current = RuleGroup::default();
        let mut in_rules = false;

        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if in_rules {
                        groups.push(std::mem::take(&mut current));
                        in_rules = false;
                    }
                    current.agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    if current.agents.is_empty() {
                        continue;
                    }
                    in_rules = true;
                    let allow = field == "allow";
                    // An empty Disallow means everything is allowed
                    if value.is_empty() {
                        if !allow {
                            current.rules.push(Rule { path: String::new(), allow: true });
                        }
                        continue;
                    }
                    current.rules.push(Rule { path: value.to_string(), allow });
                }
                _ => {}
            }
        }

        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups, policy: Policy::Rules }
    }

    /// Whether `user_agent` may fetch `url`
    pub fn is_allowed(&self, user_agent: &str, url: &str) -> bool {
        match self.policy {
            Policy::AllowAll => return true,
            Policy::DisallowAll => return false,
            Policy::Rules => {}
        }

        let path = match Url::parse(url) {
            Ok(parsed) => {
                let mut path = parsed.path().to_string();
                if let Some(query) = parsed.query() {
                    path.push('?');
                    path.push_str(query);
                }
                path
            }
            Err(_) => url.to_string(),
        };

        // Product token is the agent up to the first '/'
        let agent = user_agent
            .split('/')
            .next()
            .unwrap_or(user_agent)
            .trim()
            .to_ascii_lowercase();

        let group = self
            .groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && agent.contains(a.as_str())))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

        let Some(group) = group else {
            return true;
        };

        for rule in &group.rules {
            if path.starts_with(&rule.path) {
                return rule.allow;
            }
        }

        true
    }
}

/// Origin-level robots.txt URL for a page
pub fn robots_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let mut origin = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        origin.push_str(&format!(":{}", port));
    }
    Some(format!("{}/robots.txt", origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROBOTS: &str = "\
User-agent: ContactDiscoveryBot
Disallow: /private
Allow: /

User-agent: *
Disallow: /staff
Disallow:
";

    #[test]
    fn test_specific_agent_group_wins() {
        let rules = RobotsRules::parse(ROBOTS);
        let agent = "ContactDiscoveryBot/1.0 (+https://example.com/bot)";

        assert!(!rules.is_allowed(agent, "https://example.org/private/board"));
        assert!(rules.is_allowed(agent, "https://example.org/staff"));
    }

    #[test]
    fn test_wildcard_group_first_match() {
        let rules = RobotsRules::parse(ROBOTS);

        assert!(!rules.is_allowed("OtherBot/2.0", "https://example.org/staff/list"));
        assert!(rules.is_allowed("OtherBot/2.0", "https://example.org/about"));
    }

    #[test]
    fn test_policies_and_missing_groups() {
        assert!(RobotsRules::allow_all().is_allowed("bot", "https://example.org/x"));
        assert!(!RobotsRules::disallow_all().is_allowed("bot", "https://example.org/x"));
        assert!(RobotsRules::parse("# nothing here").is_allowed("bot", "https://example.org/x"));
    }

    #[test]
    fn test_robots_url_keeps_port() {
        assert_eq!(
            robots_url("http://127.0.0.1:8080/about/team").as_deref(),
            Some("http://127.0.0.1:8080/robots.txt")
        );
        assert_eq!(
            robots_url("https://example.org").as_deref(),
            Some("https://example.org/robots.txt")
        );
        assert!(robots_url("not a url").is_none());
    }
}

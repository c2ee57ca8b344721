//! Preflight check results, grouped by what they protect.

use serde::Serialize;

/// Area of the host a check covers; the report prints one section per area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tools,
    Policy,
    Groups,
    Host,
}

impl Category {
    const ALL: [Category; 4] = [
        Category::Tools,
        Category::Policy,
        Category::Groups,
        Category::Host,
    ];

    fn title(self) -> &'static str {
        match self {
            Category::Tools => "External tools",
            Category::Policy => "Sudo policy tree",
            Category::Groups => "Groups and shared directories",
            Category::Host => "Host",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    /// labctl will fail on this host until it is fixed.
    Fail,
    Warn,
    /// Could not be evaluated.
    Skip,
}

impl CheckStatus {
    fn marker(self) -> &'static str {
        match self {
            CheckStatus::Pass => "✓ ok  ",
            CheckStatus::Fail => "✗ FAIL",
            CheckStatus::Warn => "⚠ warn",
            CheckStatus::Skip => "○ skip",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub category: Category,
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

impl CheckResult {
    fn new(category: Category, name: &str, status: CheckStatus, details: Option<String>) -> Self {
        Self {
            category,
            name: name.to_string(),
            status,
            details,
        }
    }

    pub fn pass(category: Category, name: &str) -> Self {
        Self::new(category, name, CheckStatus::Pass, None)
    }

    pub fn fail(category: Category, name: &str, details: impl Into<String>) -> Self {
        Self::new(category, name, CheckStatus::Fail, Some(details.into()))
    }

    pub fn warn(category: Category, name: &str, details: impl Into<String>) -> Self {
        Self::new(category, name, CheckStatus::Warn, Some(details.into()))
    }

    pub fn skip(category: Category, name: &str, details: impl Into<String>) -> Self {
        Self::new(category, name, CheckStatus::Skip, Some(details.into()))
    }

    /// Attach details, e.g. the resolved path of a passing check.
    pub fn detail(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Per-status totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    pub fn tally(&self) -> Tally {
        self.checks.iter().fold(Tally::default(), |mut t, c| {
            match c.status {
                CheckStatus::Pass => t.passed += 1,
                CheckStatus::Fail => t.failed += 1,
                CheckStatus::Warn => t.warned += 1,
                CheckStatus::Skip => t.skipped += 1,
            }
            t
        })
    }

    pub fn fail_count(&self) -> usize {
        self.tally().failed
    }

    pub fn all_passed(&self) -> bool {
        self.fail_count() == 0
    }

    /// Print one section per category, in a fixed order, then the totals.
    pub fn print(&self) {
        for category in Category::ALL {
            let mut checks = self.checks.iter().filter(|c| c.category == category).peekable();
            if checks.peek().is_none() {
                continue;
            }
            println!("{}:", category.title());
            for check in checks {
                match &check.details {
                    Some(details) => {
                        println!("  {} {}: {}", check.status.marker(), check.name, details)
                    }
                    None => println!("  {} {}", check.status.marker(), check.name),
                }
            }
            println!();
        }

        let t = self.tally();
        println!(
            "{} ok, {} failed, {} warnings, {} skipped",
            t.passed, t.failed, t.warned, t.skipped
        );
    }
}

//! Keyword-level semantic checks.
//!
//! A candidate is compared against what its task description and context ask
//! for. Rules live in an ordered table and are evaluated front to back; the
//! first rule that fails decides the rejection reason. The order is part of
//! the contract:
//!
//! | # | rule                | applies when                                   |
//! |---|---------------------|------------------------------------------------|
//! | 1 | `imports`           | always                                         |
//! | 2 | `http_client`       | context mentions `http`                        |
//! | 3 | `blockchain_client` | swap / web3 / blockchain / smart contract      |
//! | 4 | `interactive_input` | context mentions `input(`                      |
//! | - | `stub_function`     | automation profile only                        |
//! | - | `automation_activity` | automation profile only                      |
//! | 5 | `structure`         | always                                         |
//! | 6 | `urls`              | context contains literal URLs                  |
//! | 7 | `headers`           | context mentions headers or a content-type     |
//! | 8 | `request_body`      | context mentions a body, payload or JSON       |
//!
//! The automation profile also rejects short `def ... pass` stubs and scripts
//! that reference no automation library or action.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which variant of the rule set to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleProfile {
    /// Full URLs must appear; a function or class is required.
    #[default]
    Strict,
    /// Only URL domains must appear; automation-library calls count as structure.
    Automation,
}

impl fmt::Display for RuleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleProfile::Strict => write!(f, "strict"),
            RuleProfile::Automation => write!(f, "automation"),
        }
    }
}

impl FromStr for RuleProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(RuleProfile::Strict),
            "automation" | "soft" => Ok(RuleProfile::Automation),
            other => Err(format!("Unknown rule profile: {}", other)),
        }
    }
}

/// A failed semantic rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct SemanticRejection {
    /// Name of the rule that failed.
    pub rule: &'static str,
    /// Human-readable reason recorded on the sample.
    pub reason: String,
}

/// Inputs shared by every rule.
struct Candidate<'a> {
    task: String,
    context: &'a str,
    context_lower: String,
    code: &'a str,
    code_lower: String,
}

impl Candidate<'_> {
    fn mentions(&self, needle: &str) -> bool {
        self.task.contains(needle) || self.context_lower.contains(needle)
    }
}

type Check = fn(&Patterns, &Candidate<'_>) -> Result<(), String>;

struct Rule {
    name: &'static str,
    check: Check,
}

struct Patterns {
    url: Regex,
    client_call: Regex,
    session_call: Regex,
    body_argument: Regex,
}

const AUTOMATION_CALL_MARKERS: &[&str] = &[
    "def ",
    "class ",
    "async def",
    "await",
    "requests.",
    "httpx.",
    "aiohttp.",
    "web3.",
    "selenium.",
    "pyautogui.",
];

/// Libraries and action words that mark a script as doing automation work.
const AUTOMATION_KEYWORDS: &[&str] = &[
    "requests",
    "aiohttp",
    "httpx",
    "selenium",
    "web3",
    "pyautogui",
    "pyppeteer",
    "undetected_chromedriver",
    "sign",
    "claim",
    "swap",
    "trigger",
    "button",
    "submit",
    "task",
    "schedule",
];

/// Scripts at most this long that define a function and contain `pass` are stubs.
const STUB_MAX_LINES: usize = 5;

/// Evaluates the ordered rule table for one profile.
pub struct SemanticValidator {
    profile: RuleProfile,
    rules: Vec<Rule>,
    patterns: Patterns,
}

impl SemanticValidator {
    pub fn new(profile: RuleProfile) -> Result<Self, regex::Error> {
        let patterns = Patterns {
            url: Regex::new(r#"https?://[^\s"']+"#)?,
            client_call: Regex::new(r"requests\.(?:get|post|put|delete|patch|request)\s*\(")?,
            session_call: Regex::new(r"\.(?:get|post|put|delete|patch|request)\s*\(")?,
            body_argument: Regex::new(r"\b(?:json|data)\s*=")?,
        };

        let (structure, urls): (Check, Check) = match profile {
            RuleProfile::Strict => (check_structure_strict, check_urls_full),
            RuleProfile::Automation => (check_structure_automation, check_urls_domain),
        };

        let mut rules = vec![
            Rule { name: "imports", check: check_imports },
            Rule { name: "http_client", check: check_http_client },
            Rule { name: "blockchain_client", check: check_blockchain_client },
            Rule { name: "interactive_input", check: check_interactive_input },
        ];
        if profile == RuleProfile::Automation {
            rules.push(Rule { name: "stub_function", check: check_stub_function });
            rules.push(Rule { name: "automation_activity", check: check_automation_activity });
        }
        rules.extend([
            Rule { name: "structure", check: structure },
            Rule { name: "urls", check: urls },
            Rule { name: "headers", check: check_headers },
            Rule { name: "request_body", check: check_request_body },
        ]);

        Ok(Self {
            profile,
            rules,
            patterns,
        })
    }

    pub fn profile(&self) -> RuleProfile {
        self.profile
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Checks a candidate against its task. The first failing rule wins.
    pub fn validate(
        &self,
        task_description: &str,
        context: &str,
        candidate: &str,
    ) -> Result<(), SemanticRejection> {
        let candidate = Candidate {
            task: task_description.to_lowercase(),
            context,
            context_lower: context.to_lowercase(),
            code: candidate,
            code_lower: candidate.to_lowercase(),
        };

        for rule in &self.rules {
            if let Err(reason) = (rule.check)(&self.patterns, &candidate) {
                return Err(SemanticRejection {
                    rule: rule.name,
                    reason,
                });
            }
        }
        Ok(())
    }
}

fn check_imports(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    let first = c
        .code
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'));

    let is_import = first.is_some_and(|line| {
        line.starts_with("import ") || (line.starts_with("from ") && line.contains(" import "))
    });
    if is_import {
        Ok(())
    } else {
        Err("no imports".to_string())
    }
}

fn check_http_client(p: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    if !c.context_lower.contains("http") {
        return Ok(());
    }
    if !c.code.contains("requests") {
        return Err("HTTP request mentioned but the 'requests' module is not used".to_string());
    }
    let has_call = p.client_call.is_match(c.code)
        || (c.code.contains("requests.Session(") && p.session_call.is_match(c.code));
    if has_call {
        Ok(())
    } else {
        Err("HTTP request mentioned but no GET/POST/PUT/DELETE/PATCH call".to_string())
    }
}

fn check_blockchain_client(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    let mentioned = c.task.contains("swap")
        || c.context_lower.contains("web3")
        || c.mentions("blockchain")
        || c.mentions("smart contract");
    if mentioned && !c.code_lower.contains("web3") {
        return Err("blockchain interaction mentioned but Web3 is not used".to_string());
    }
    Ok(())
}

fn check_interactive_input(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    if c.context_lower.contains("input(") && !c.code.contains("input(") {
        return Err("interactive input mentioned but input() is never called".to_string());
    }
    Ok(())
}

fn check_structure_strict(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    if c.code.contains("def ") || c.code.contains("class ") {
        Ok(())
    } else {
        Err("no function or class defined".to_string())
    }
}

fn check_structure_automation(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    if AUTOMATION_CALL_MARKERS.iter().any(|m| c.code.contains(m)) {
        Ok(())
    } else {
        Err("no function, class or automation call found".to_string())
    }
}

fn check_stub_function(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    let code = c.code.trim();
    let is_stub =
        code.contains("pass") && code.contains("def") && code.lines().count() <= STUB_MAX_LINES;
    if is_stub {
        Err("empty function with pass".to_string())
    } else {
        Ok(())
    }
}

fn check_automation_activity(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    if AUTOMATION_KEYWORDS.iter().any(|k| c.code_lower.contains(k)) {
        Ok(())
    } else {
        Err("no automation activity found in script".to_string())
    }
}

/// Literal URLs in the context with trailing punctuation removed.
fn context_urls<'a>(p: &Patterns, c: &Candidate<'a>) -> Vec<&'a str> {
    p.url
        .find_iter(c.context)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', ')', ']', '}']))
        .filter(|url| !url.is_empty())
        .collect()
}

fn check_urls_full(p: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    for url in context_urls(p, c) {
        if !c.code_lower.contains(&url.to_lowercase()) {
            return Err(format!("URL '{}' not found in script", url));
        }
    }
    Ok(())
}

fn check_urls_domain(p: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    for url in context_urls(p, c) {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase));
        match host {
            Some(domain) => {
                if !c.code_lower.contains(&domain) {
                    return Err(format!("domain '{}' of URL '{}' not found in script", domain, url));
                }
            }
            None => {
                if !c.code_lower.contains(&url.to_lowercase()) {
                    return Err(format!("URL '{}' not found in script", url));
                }
            }
        }
    }
    Ok(())
}

fn check_headers(_: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    let mentioned = c.context_lower.contains("header") || c.context_lower.contains("content-type");
    if !mentioned {
        return Ok(());
    }
    let marker = c.code_lower.contains("json") || c.code_lower.contains("content-type");
    if c.code_lower.contains("headers") && marker {
        Ok(())
    } else {
        Err("headers mentioned but no headers with a JSON/content-type marker".to_string())
    }
}

fn check_request_body(p: &Patterns, c: &Candidate<'_>) -> Result<(), String> {
    let mentioned = ["body", "payload", "json"]
        .iter()
        .any(|k| c.context_lower.contains(k));
    if mentioned && !p.body_argument.is_match(c.code) {
        return Err("request body mentioned but no json=/data= argument passed".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"import requests

def fetch():
    headers = {"Content-Type": "application/json"}
    r = requests.post("http://api.example.com/x", json={"a": 1}, headers=headers)
    print(r.status_code)

fetch()
"#;

    fn strict() -> SemanticValidator {
        SemanticValidator::new(RuleProfile::Strict).unwrap()
    }

    fn automation() -> SemanticValidator {
        SemanticValidator::new(RuleProfile::Automation).unwrap()
    }

    #[test]
    fn test_rule_order_is_fixed() {
        assert_eq!(
            strict().rule_names(),
            vec![
                "imports",
                "http_client",
                "blockchain_client",
                "interactive_input",
                "structure",
                "urls",
                "headers",
                "request_body",
            ]
        );
    }

    #[test]
    fn test_accepts_matching_candidate() {
        let context = "POST http://api.example.com/x with JSON body, header Content-Type: application/json";
        assert_eq!(strict().validate("Create item", context, GOOD), Ok(()));
    }

    #[test]
    fn test_missing_imports() {
        let err = strict().validate("t", "", "def main():\n    pass").unwrap_err();
        assert_eq!(err.rule, "imports");
        assert_eq!(err.reason, "no imports");
    }

    #[test]
    fn test_leading_comments_before_import_are_allowed() {
        let code = "#!/usr/bin/env python3\n# tool\nfrom os import path\n\ndef f():\n    return path";
        assert_eq!(strict().validate("t", "", code), Ok(()));
    }

    #[test]
    fn test_http_context_without_requests() {
        let code = "import urllib.request\n\ndef f():\n    urllib.request.urlopen('http://api.example.com/x')";
        let err = strict()
            .validate("Fetch", "GET http://api.example.com/x", code)
            .unwrap_err();
        assert_eq!(err.rule, "http_client");
        assert!(err.reason.contains("'requests' module is not used"));
    }

    #[test]
    fn test_http_context_without_verb_call() {
        let code = "import requests\n\ndef f():\n    return requests.codes.ok";
        let err = strict().validate("Fetch", "http://api.example.com", code).unwrap_err();
        assert_eq!(err.rule, "http_client");
        assert!(err.reason.contains("GET/POST"));
    }

    #[test]
    fn test_session_calls_count_as_verbs() {
        let code = "import requests\n\ndef f():\n    s = requests.Session()\n    s.put('http://api.example.com')";
        assert_eq!(strict().validate("Update", "PUT http://api.example.com", code), Ok(()));
    }

    #[test]
    fn test_swap_requires_web3() {
        let code = "import json\n\ndef swap():\n    return json.dumps({})";
        let err = strict().validate("Swap tokens on a DEX", "", code).unwrap_err();
        assert_eq!(err.rule, "blockchain_client");

        let code = "from web3 import Web3\n\ndef swap():\n    return Web3";
        assert_eq!(strict().validate("Swap tokens on a DEX", "", code), Ok(()));
    }

    #[test]
    fn test_interactive_input() {
        let code = "import sys\n\ndef main():\n    print(sys.argv)";
        let err = strict()
            .validate("Ask name", "name = input('Name: ')", code)
            .unwrap_err();
        assert_eq!(err.rule, "interactive_input");
    }

    #[test]
    fn test_structure_differs_by_profile() {
        let code = "import requests\nrequests.get('http://api.example.com')";
        let context = "GET http://api.example.com";

        let err = strict().validate("Ping", context, code).unwrap_err();
        assert_eq!(err.rule, "structure");
        assert_eq!(automation().validate("Ping", context, code), Ok(()));
    }

    #[test]
    fn test_full_url_vs_domain() {
        let code = "import requests\n\ndef f():\n    requests.get('https://api.example.com/v2/users')";
        let context = "See https://api.example.com/v1/users.";

        let err = strict().validate("List users", context, code).unwrap_err();
        assert_eq!(err.rule, "urls");
        assert_eq!(err.reason, "URL 'https://api.example.com/v1/users' not found in script");

        assert_eq!(automation().validate("List users", context, code), Ok(()));
    }

    #[test]
    fn test_domain_mismatch_names_domain() {
        let code = "import requests\n\ndef f():\n    requests.get('https://other.org')";
        let err = automation()
            .validate("t", "GET https://api.example.com/x", code)
            .unwrap_err();
        assert!(err.reason.contains("'api.example.com'"));
    }

    #[test]
    fn test_headers_rule() {
        let code = "import requests\n\ndef f():\n    requests.get('http://h.io')";
        let err = strict()
            .validate("t", "GET http://h.io with header X-Token", code)
            .unwrap_err();
        assert_eq!(err.rule, "headers");
    }

    #[test]
    fn test_request_body_rule() {
        let code = "import requests\n\ndef f():\n    requests.post('http://h.io')";
        let err = strict()
            .validate("t", "POST http://h.io with payload {\"a\": 1}", code)
            .unwrap_err();
        assert_eq!(err.rule, "request_body");

        let code = "import requests\n\ndef f():\n    requests.post('http://h.io', data = {'a': 1})";
        assert_eq!(
            strict().validate("t", "POST http://h.io with payload", code),
            Ok(())
        );
    }

    #[test]
    fn test_first_failure_wins() {
        // Fails imports, structure and urls; only the first is reported.
        let err = strict()
            .validate("t", "see https://example.com", "print('x')")
            .unwrap_err();
        assert_eq!(err.rule, "imports");
    }

    #[test]
    fn test_automation_rule_order() {
        assert_eq!(
            automation().rule_names(),
            vec![
                "imports",
                "http_client",
                "blockchain_client",
                "interactive_input",
                "stub_function",
                "automation_activity",
                "structure",
                "urls",
                "headers",
                "request_body",
            ]
        );
        assert_eq!(automation().profile(), RuleProfile::Automation);
    }

    #[test]
    fn test_automation_rejects_pass_stub() {
        let code = "import requests

def run():
    pass";
        let err = automation().validate("Submit form", "", code).unwrap_err();
        assert_eq!(err.rule, "stub_function");
        assert_eq!(err.reason, "empty function with pass");

        // Strict has no stub rule; the same code passes it.
        assert_eq!(strict().validate("Submit form", "", code), Ok(()));
    }

    #[test]
    fn test_automation_requires_activity() {
        let code = "import math

def area(r):
    return math.pi * r * r

print(area(2))";
        let err = automation().validate("Circle area", "", code).unwrap_err();
        assert_eq!(err.rule, "automation_activity");
        assert_eq!(strict().validate("Circle area", "", code), Ok(()));

        let code = "import pyautogui

def click():
    pyautogui.click(10, 20)

click()";
        assert_eq!(automation().validate("Click", "", code), Ok(()));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("strict".parse::<RuleProfile>(), Ok(RuleProfile::Strict));
        assert_eq!("Automation".parse::<RuleProfile>(), Ok(RuleProfile::Automation));
        assert!("lenient".parse::<RuleProfile>().is_err());
        assert_eq!(RuleProfile::default().to_string(), "strict");
    }
}

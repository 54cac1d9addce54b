//! Run report: terminal summary and JSON output

use chrono::{DateTime, Utc};
use colored::*;
use dp_oracle::testcase::CaseReport;
use dp_oracle::Verdict;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub cases_file: String,
    pub seed: String,
    pub number_of_votes: usize,
    pub consistent: usize,
    pub violations: usize,
    pub inconclusive: usize,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    pub fn new(cases_file: String, seed: String, number_of_votes: usize, cases: Vec<CaseReport>) -> Self {
        let count = |f: fn(&Verdict) -> bool| cases.iter().filter(|case| f(&case.verdict)).count();
        let consistent = count(|v| matches!(v, Verdict::Consistent));
        let violations = count(|v| matches!(v, Verdict::ViolationDetected));
        let inconclusive = count(|v| matches!(v, Verdict::Inconclusive { .. }));

        RunReport {
            generated_at: Utc::now(),
            cases_file,
            seed,
            number_of_votes,
            consistent,
            violations,
            inconclusive,
            cases,
        }
    }

    pub fn all_consistent(&self) -> bool {
        self.consistent == self.cases.len()
    }

    pub fn print(&self) {
        println!();
        println!("{}", "─".repeat(60));
        println!("{}", "SUMMARY".green().bold());
        println!("{}", "─".repeat(60));
        println!("  Cases:        {}", self.cases.len());
        println!("  Consistent:   {}", self.consistent.to_string().green());
        println!("  Violations:   {}", self.violations.to_string().red());
        println!("  Inconclusive: {}", self.inconclusive.to_string().yellow());
        println!("  Seed:         {}", self.seed);
        println!();

        if self.all_consistent() {
            println!("{}", "  ALL CASES CONSISTENT".green().bold());
        } else {
            println!("{}", "  SOME CASES DID NOT PASS".red().bold());
        }
    }
}

/// One line per finished case
pub fn case_line(report: &CaseReport) -> String {
    let votes = match report.true_votes {
        Some(true_votes) => format!("{}/{} votes", true_votes, report.number_of_votes),
        None => "no votes".to_string(),
    };
    let verdict = match &report.verdict {
        Verdict::Consistent => "CONSISTENT".green().bold(),
        Verdict::ViolationDetected => "VIOLATION".red().bold(),
        Verdict::Inconclusive { .. } => "INCONCLUSIVE".yellow().bold(),
    };

    let mut line = format!(
        "  {:<12} {} ({}, {:.1}s)",
        verdict,
        report.name,
        votes,
        report.elapsed_ms as f64 / 1000.0
    );
    if let Verdict::Inconclusive { reason } = &report.verdict {
        line.push_str(&format!("\n{:>15}{}", "", reason.dimmed()));
    }
    for advisory in &report.advisories {
        line.push_str(&format!("\n{:>15}{}", "", advisory.yellow()));
    }
    line
}

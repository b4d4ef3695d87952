//! `todo-e2e list`

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use todo_e2e::{load_scenarios, Scenario, SuiteConfig, TestRunner};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include YAML scenarios from this directory
    #[arg(long)]
    pub specs: Option<PathBuf>,

    /// Only list scenarios matching this regex
    #[arg(short, long)]
    pub grep: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioRow {
    pub id: String,
    pub title: String,
    pub group: String,
    pub tags: Vec<String>,
}

impl From<&Scenario> for ScenarioRow {
    fn from(s: &Scenario) -> Self {
        Self {
            id: s.id.clone(),
            title: s.title.clone(),
            group: s.group.label().to_string(),
            tags: s.tags.clone(),
        }
    }
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Group", "Title", "Tags"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.group.clone(),
            self.title.clone(),
            self.tags.iter().map(|t| format!("@{}", t)).collect::<Vec<_>>().join(" "),
        ]
    }
}

pub fn scenario_rows(args: &ListArgs) -> anyhow::Result<Vec<ScenarioRow>> {
    let config = SuiteConfig {
        specs_dir: args.specs.clone(),
        grep: args.grep.clone(),
        ..Default::default()
    };
    config.validate()?;
    let scenarios = load_scenarios(&config)?;
    let selected = TestRunner::new(config).select(scenarios)?;
    Ok(selected.iter().map(ScenarioRow::from).collect())
}

pub async fn execute(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let rows = scenario_rows(&args)?;
    print_list(&rows, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_whole_catalogue() {
        let rows = scenario_rows(&ListArgs { specs: None, grep: None }).unwrap();
        assert_eq!(rows.len(), 49);
        assert_eq!(rows[0].id, "TC001");
        assert_eq!(rows[48].id, "TC049");
    }

    #[test]
    fn test_grep_filters_rows() {
        let args = ListArgs {
            specs: None,
            grep: Some("Accessibility".into()),
        };
        let ids: Vec<_> = scenario_rows(&args).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["TC041", "TC042"]);
    }

    #[test]
    fn test_includes_yaml_scenarios() {
        let dir = std::env::temp_dir().join(format!("todo-cli-list-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("extra.yaml"),
            "name: extra\ntags: [smoke]\nsteps:\n  - action: reload\n",
        )
        .unwrap();

        let args = ListArgs {
            specs: Some(dir.clone()),
            grep: Some("@smoke".into()),
        };
        let rows = scenario_rows(&args).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row()[3], "@smoke");
    }
}

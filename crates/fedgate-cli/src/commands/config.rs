use anyhow::{Context, Result};
use colored::Colorize;
use fedgate_auth::{CourseSupport, HookRegistry, LoginConfig};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::{ConfigCheckArgs, ConfigInitArgs, OutputFormat};
use crate::output::{print_json, print_success};

pub fn check(args: &ConfigCheckArgs, hooks: &HookRegistry, format: OutputFormat) -> Result<()> {
    let config = LoginConfig::load(&args.path)?;
    hooks.resolve(config.hooks.as_deref())?;

    if matches!(format, OutputFormat::Json) {
        return print_json(&config);
    }

    print_success(&format!("{} is valid", args.path.display()));

    let yes_no = |flag: bool| (if flag { "yes" } else { "no" }).to_string();
    let mut builder = Builder::default();
    builder.push_record(["Setting".to_string(), "Value".to_string()]);
    for (key, value) in [
        ("username_attribute", config.username_attribute.clone()),
        ("role_attribute", config.role_attribute.clone()),
        ("disable_jit", yes_no(config.disable_jit)),
        ("course_support", course_support_name(config.course_support).to_string()),
        (
            "course_attribute",
            config.course_attribute.clone().unwrap_or_else(|| "-".to_string()),
        ),
        ("site_root", config.site_root()),
        ("login_endpoint", config.login_endpoint_url()),
        ("login_page", config.login_page_url()),
        ("log_extra_info", yes_no(config.log_extra_info)),
        ("dont_display_to_user", yes_no(config.dont_display_to_user)),
        ("single_logout", yes_no(config.single_logout)),
        (
            "log_file",
            config
                .log_file
                .as_ref()
                .map_or_else(|| "(tracing)".to_string(), |p| p.display().to_string()),
        ),
    ] {
        builder.push_record([key.to_string(), value]);
    }
    println!("{}", builder.build().with(Style::rounded()));

    if !config.role_mapping.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Role", "Claims"]);
        for shortname in config.role_mapping.shortnames() {
            let claims = config
                .role_mapping
                .claims_for(shortname)
                .join(", ");
            builder.push_record([shortname, claims.as_str()]);
        }
        println!("{}", builder.build().with(Style::rounded()));
    }

    if !config.courses.mapping.is_empty() {
        println!(
            "{}: {} mapped ({} active)",
            "Courses".cyan(),
            config.courses.mapping.len(),
            config.courses.mapping.values().filter(|c| c.active).count()
        );
    }
    Ok(())
}

pub fn init(args: &ConfigInitArgs) -> Result<()> {
    let config = LoginConfig::new(
        args.username_attribute.as_str(),
        args.role_attribute.as_str(),
        false,
        CourseSupport::NoSupport,
    );
    config.validate()?;
    let content = toml::to_string_pretty(&config).context("Failed to render configuration")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Wrote {}", path.display()));
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn course_support_name(mode: CourseSupport) -> &'static str {
    match mode {
        CourseSupport::NoSupport => "nosupport",
        CourseSupport::Internal => "internal",
        CourseSupport::External => "external",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_output_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedgate.toml");

        init(&ConfigInitArgs {
            username_attribute: fedgate_auth::DEFAULT_USERNAME_ATTRIBUTE.to_string(),
            role_attribute: "eduPersonAffiliation".to_string(),
            output: Some(path.clone()),
        })
        .unwrap();

        let config = LoginConfig::load(&path).unwrap();
        assert_eq!(config.username_attribute, "eduPersonPrincipalName");
        assert_eq!(config.course_support, CourseSupport::NoSupport);
        assert!(!config.disable_jit);
    }

    #[test]
    fn test_check_rejects_unknown_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedgate.toml");
        std::fs::write(
            &path,
            r#"
username_attribute = "uid"
role_attribute = "affiliation"
disable_jit = true
course_support = "nosupport"
hooks = "campus"
"#,
        )
        .unwrap();

        let err = check(
            &ConfigCheckArgs { path },
            &HookRegistry::new(),
            OutputFormat::Table,
        )
        .unwrap_err();
        assert!(err.to_string().contains("campus"));
    }
}

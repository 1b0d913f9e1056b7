use anyhow::Result;
use colored::Colorize;
use fedgate_auth::{CompletedLogin, ErrorPage, LoginOutcome, RoleOp};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_outcome(outcome: &LoginOutcome, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Json) {
        return print_json(outcome);
    }

    match outcome {
        LoginOutcome::Redirect { location, login } => {
            if let Some(login) = login {
                print_login(login);
            }
            println!("{}: {}", "Redirect".cyan(), location);
        }
        LoginOutcome::ErrorPage { page, login } => {
            if let Some(login) = login {
                print_login(login);
            }
            print_error_page(page);
        }
    }
    Ok(())
}

fn print_login(login: &CompletedLogin) {
    let user = &login.principal.user;
    print_success(&format!(
        "{} logged in ({}, id {})",
        user.username.bold(),
        login.provisioning,
        user.id
    ));

    if !login.role_ops.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Operation", "Role", "Role ID"]);
        for op in &login.role_ops {
            let action = match op {
                RoleOp::Assign(_) => "assign",
                RoleOp::Unassign(_) => "unassign",
            };
            builder.push_record([action, op.role().shortname.as_str(), op.role().id.as_str()]);
        }
        println!("{}", builder.build().with(Style::rounded()));
    }

    if let Some(mapping) = &login.course_mapping {
        if mapping.courses.is_empty() {
            println!("{}: none", "Courses".cyan());
        } else {
            let mut builder = Builder::default();
            builder.push_record(["Course", "Role", "Active"]);
            for course in &mapping.courses {
                let active = if course.active { "yes" } else { "no" };
                builder.push_record([course.course.as_str(), course.role.as_str(), active]);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
    }
}

fn print_error_page(page: &ErrorPage) {
    for (category, messages) in page.errors.iter() {
        for message in messages {
            print_error(&format!("[{}] {}", category.as_str(), message));
        }
    }
    println!("{}: {}", "Continue".cyan(), page.redirect);
}

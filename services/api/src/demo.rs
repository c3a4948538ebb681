use crate::infra::{InMemoryRoleStore, InMemoryUserDirectory};
use clap::Args;
use rolecall::error::AppError;
use rolecall::roles::{
    ApplicantStatus, CommitPolicy, Committed, RoleApplicationService, RoleId, UserId,
};
use std::sync::Arc;

type DemoService = RoleApplicationService<InMemoryRoleStore, InMemoryUserDirectory>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Openings granted to the sample role
    #[arg(long, default_value_t = 2)]
    pub(crate) positions: u32,
    /// Skip the openings adjustment portion of the demo.
    #[arg(long)]
    pub(crate) skip_openings: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        positions,
        skip_openings,
    } = args;

    let service: DemoService = RoleApplicationService::new(
        Arc::new(InMemoryRoleStore::default()),
        Arc::new(InMemoryUserDirectory::seeded()),
        CommitPolicy::default(),
    );

    println!("Role allocation demo");
    let record = service.create_role(positions)?;
    let role_id = record.role.id().clone();
    println!(
        "- Created {} with {} openings",
        role_id, record.role.original_positions()
    );

    let students = ["u-1001", "u-1002", "u-1003"];
    for id in students {
        report_step(&format!("{id} applies"), service.apply(&role_id, &user(id)));
    }

    println!("\nAdministrators cannot apply");
    report_step("u-9001 applies", service.apply(&role_id, &user("u-9001")));

    println!("\nStatus changes");
    report_step(
        "u-1003 -> interviewing",
        service.set_status(&role_id, &user("u-1003"), ApplicantStatus::Interviewing),
    );
    for id in ["u-1001", "u-1002"] {
        report_step(
            &format!("{id} -> accepted"),
            service.set_status(&role_id, &user(id), ApplicantStatus::Accepted),
        );
    }
    report_step("u-1004 applies", service.apply(&role_id, &user("u-1004")));
    report_step(
        "u-1001 -> rejected",
        service.set_status(&role_id, &user("u-1001"), ApplicantStatus::Rejected),
    );

    if !skip_openings {
        println!("\nOpenings");
        report_step("increase", service.increase_openings(&role_id));
        for _ in 0..3 {
            report_step("decrease", service.decrease_openings(&role_id));
        }
    }

    print_applicants(&service, &role_id)?;
    Ok(())
}

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

fn report_step(label: &str, result: Result<Committed, rolecall::roles::ApplicationServiceError>) {
    match result {
        Ok(committed) => {
            let role = committed.role();
            println!(
                "  - {label}: {}/{} openings left, {} applicants",
                role.positions_available(),
                role.original_positions(),
                role.applicants().len()
            );
            for removed in &committed.removed {
                println!("      removed {}", removed.user_id);
            }
        }
        Err(err) => println!("  - {label}: refused ({}: {err})", err.kind().label()),
    }
}

fn print_applicants(service: &DemoService, role_id: &RoleId) -> Result<(), AppError> {
    println!("\nApplicants for {role_id}");
    let applicants = service.list_applicants(role_id)?;
    if applicants.is_empty() {
        println!("  (none)");
    }
    for view in applicants {
        println!(
            "  - {} <{}> {}",
            view.profile.username,
            view.profile.email,
            view.application_status.label()
        );
    }
    Ok(())
}

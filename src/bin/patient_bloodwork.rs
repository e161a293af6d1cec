//! Demo skill: canned bloodwork panel for a patient id

use std::process::ExitCode;

use clap::Parser;
use skillrun::render_tool_output;
use skillrun::skills::{self, SkillError, PATIENT_BLOODWORK};

#[derive(Parser, Debug)]
#[command(name = "patient-bloodwork", about = "Fetch bloodwork for a patient id")]
struct Args {
    /// Skill input, e.g. '{"inputArgs": {"patient_id": "H12345"}}'
    input: Option<String>,

    /// Print the skill descriptor instead of running
    #[arg(long)]
    describe: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => return fail(SkillError::Usage(PATIENT_BLOODWORK)),
    };

    if args.describe {
        let descriptor = skills::descriptors()
            .into_iter()
            .find(|d| d.name == PATIENT_BLOODWORK);
        println!("{}", serde_json::to_string_pretty(&descriptor).unwrap_or_default());
        return ExitCode::SUCCESS;
    }

    let Some(input) = args.input else {
        return fail(SkillError::Usage(PATIENT_BLOODWORK));
    };

    match skills::patient_bloodwork(&input) {
        Ok(output) => {
            println!("{}", render_tool_output(&output));
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn fail(err: SkillError) -> ExitCode {
    match err {
        SkillError::Usage(_) => eprintln!("{err}"),
        _ => eprintln!("Error: {err}"),
    }
    ExitCode::from(err.bloodwork_exit_code())
}

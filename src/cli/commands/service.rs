use clap::{Arg, ArgAction, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_code_args(command);
    with_guard_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL, also decides the Secure cookie flag")
                .env("RAKONTI_FRONTEND_BASE_URL")
                .default_value("https://rakonti.dev"),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session token TTL in seconds")
                .env("RAKONTI_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-grace-seconds")
                .long("refresh-grace-seconds")
                .help("Grace period before a refreshed session token is deleted")
                .env("RAKONTI_REFRESH_GRACE_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_code_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("flow-ttl-seconds")
                .long("flow-ttl-seconds")
                .help("Restricted flow token TTL in seconds")
                .env("RAKONTI_FLOW_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("phone-code-ttl-seconds")
                .long("phone-code-ttl-seconds")
                .help("Phone verification code TTL in seconds")
                .env("RAKONTI_PHONE_CODE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("email-code-ttl-seconds")
                .long("email-code-ttl-seconds")
                .help("Email verification code TTL in seconds")
                .env("RAKONTI_EMAIL_CODE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("code-resend-interval-seconds")
                .long("code-resend-interval-seconds")
                .help("Cooldown before another code is sent to the same destination")
                .env("RAKONTI_CODE_RESEND_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("max-code-attempts")
                .long("max-code-attempts")
                .help("Verification attempts before a code is invalidated")
                .env("RAKONTI_MAX_CODE_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("derived-token-ttl-seconds")
                .long("derived-token-ttl-seconds")
                .help("TTL for register and reset tokens minted by email verification")
                .env("RAKONTI_DERIVED_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_guard_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("dedup-retention-seconds")
                .long("dedup-retention-seconds")
                .help("Window in which identical completed requests are suppressed")
                .env("RAKONTI_DEDUP_RETENTION_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("sweep-interval-seconds")
                .long("sweep-interval-seconds")
                .help("Interval between expiry sweeps of stores and session rows")
                .env("RAKONTI_SWEEP_INTERVAL_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("time-source")
                .long("time-source")
                .help("Trusted time source URL, repeatable; falls back to the local clock")
                .env("RAKONTI_TIME_SOURCE")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
}

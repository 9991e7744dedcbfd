pub const USAGE: &str =
    "Usage: ssorepeat [--help] [--profile PROFILE] [FILTERS...] [COMMAND [ARGS...]]";

pub const DOCUMENTATION: &str = r#"ssorepeat

    Repeats COMMAND across the account/role pairs of an AWS Single Sign-On
    session, selected with FILTERS. Each pair gets its own temporary
    credentials. Results are streamed to stdout as one JSON array.

    Usage:
        ssorepeat [--help] [--profile PROFILE] [FILTERS...] [COMMAND [ARGS...]]

    Example:
        ssorepeat --profile PROFILE exec aws s3 ls

    runs "aws s3 ls" in every account of the SSO session where the role of
    PROFILE exists. Without a command, the selected pairs are listed.

    Running write operations this way changes every selected account at
    once. Check the selection with "list" first.

Arguments:

    --help
        Prints this help. Only honoured before "exec" or right after it;
        anywhere else it is passed on to the command.

    --profile PROFILE
        Must come first. The SSO profile to use; defaults to $AWS_PROFILE,
        then to "default".

    FILTERS
        Sequential conditions selecting account/role pairs. See "Filters".

    COMMAND
        "list" (default), "creds" or "exec ARGS...". See "Commands".

Configuration:

    PROFILE must be an SSO profile of ~/.aws/config (or $AWS_CONFIG_FILE)
    with an active login:

        [profile ROLE-ACCOUNTID]
        sso_session = SSO_SESSION
        sso_account_id = ACCOUNTID
        sso_role_name = ROLE
        [sso-session SSO_SESSION]
        sso_start_url = https://SUBDOMAIN.awsapps.com/start
        sso_region = eu-west-1
        sso_registration_scopes = sso:account:access

        aws sso login --profile ROLE-ACCOUNTID
        ssorepeat --profile ROLE-ACCOUNTID exec aws s3 ls

    The token cached by "aws sso login" for SSO_SESSION is reused, and
    refreshed when it has expired. sso_account_id is ignored: every account
    of the session is considered, with sso_role_name as the default role.

Filters:

    Filters apply in order, like the expressions of GNU find. They work on a
    buffer holding the accounts of the session. Associating roles moves the
    buffer into the selection and empties it.

    --reset
        Refills the buffer with every account.

    --include-only REGEX
        Keeps the accounts whose name matches REGEX.

    --exclude REGEX
        Drops the accounts whose name matches REGEX.

    --assoc ROLE[,ROLE...]
        Selects each account of the buffer with each ROLE, then empties the
        buffer.

    --assoc-default
        Same as --assoc with the role of PROFILE. Always implied at the end of
        the filters.

Commands:

    list
        The selected pairs where the role exists.

    creds
        Temporary credentials for each selected pair.

    exec ARGS...
        Runs ARGS once per selected pair with AWS_ACCESS_KEY_ID,
        AWS_SECRET_ACCESS_KEY and AWS_SESSION_TOKEN set, and reports its exit
        code, stdout and stderr.

    Pairs whose role does not exist are skipped.

Examples:

    ssorepeat --profile PROFILE \
        --exclude '\b[pP]layground\b' \
        --exclude '\b[Ss]taging\b' \
        exec aws s3 ls

    runs "aws s3 ls" in every account except playground and staging ones.

    ssorepeat --profile PROFILE \
        --include-only '\b[pP]layground\b' --assoc ROLE1 \
        --reset \
        --include-only '\b[Ss]taging\b' --assoc ROLE2 \
        exec aws s3 ls

    runs "aws s3 ls" as ROLE1 in playground accounts, then as ROLE2 in
    staging accounts.

Exit status:

    0 on success, 1 on invalid arguments or a failed run, 2 when the profile
    or its SSO login cannot be used."#;

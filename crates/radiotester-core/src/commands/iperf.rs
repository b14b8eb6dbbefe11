//! Argument grammar of the `iperf` console command.
//!
//! Only the request is parsed here; measuring throughput is left to whatever
//! engine the board links in.

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_DURATION_SECS: u16 = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IperfRole<'a> {
    Client { host: &'a str },
    Server,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IperfRequest<'a> {
    pub role: IperfRole<'a>,
    pub port: u16,
    pub duration_secs: u16,
    pub interval_secs: Option<u16>,
    pub udp: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IperfParseError<'a> {
    MissingRole,
    ConflictingRole,
    MissingValue(&'a str),
    InvalidValue(&'a str),
    UnknownOption(&'a str),
}

/// Parses `-c <host> | -s` plus `-p <port>`, `-t <secs>`, `-i <secs>`, `-u`.
pub fn parse_request<'a>(args: &[&'a str]) -> Result<IperfRequest<'a>, IperfParseError<'a>> {
    let mut role = None;
    let mut port = DEFAULT_PORT;
    let mut duration_secs = DEFAULT_DURATION_SECS;
    let mut interval_secs = None;
    let mut udp = false;

    let mut iter = args.iter().copied();
    while let Some(option) = iter.next() {
        match option {
            "-c" => {
                let host = iter.next().ok_or(IperfParseError::MissingValue(option))?;
                set_role(&mut role, IperfRole::Client { host })?;
            }
            "-s" => set_role(&mut role, IperfRole::Server)?,
            "-p" => port = parse_number(option, iter.next())?,
            "-t" => duration_secs = parse_number(option, iter.next())?,
            "-i" => interval_secs = Some(parse_number(option, iter.next())?),
            "-u" => udp = true,
            _ => return Err(IperfParseError::UnknownOption(option)),
        }
    }

    Ok(IperfRequest {
        role: role.ok_or(IperfParseError::MissingRole)?,
        port,
        duration_secs,
        interval_secs,
        udp,
    })
}

fn set_role<'a>(
    slot: &mut Option<IperfRole<'a>>,
    role: IperfRole<'a>,
) -> Result<(), IperfParseError<'a>> {
    if slot.replace(role).is_some() {
        return Err(IperfParseError::ConflictingRole);
    }
    Ok(())
}

fn parse_number<'a>(option: &'a str, value: Option<&'a str>) -> Result<u16, IperfParseError<'a>> {
    let value = value.ok_or(IperfParseError::MissingValue(option))?;
    match value.parse::<u16>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(IperfParseError::InvalidValue(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_request_with_options() {
        let request = parse_request(&["-c", "192.168.1.2", "-p", "5201", "-t", "30", "-u"]).unwrap();
        assert_eq!(
            request,
            IperfRequest {
                role: IperfRole::Client {
                    host: "192.168.1.2"
                },
                port: 5201,
                duration_secs: 30,
                interval_secs: None,
                udp: true,
            }
        );
    }

    #[test]
    fn server_request_uses_defaults() {
        let request = parse_request(&["-s", "-i", "1"]).unwrap();
        assert_eq!(request.role, IperfRole::Server);
        assert_eq!(request.port, DEFAULT_PORT);
        assert_eq!(request.duration_secs, DEFAULT_DURATION_SECS);
        assert_eq!(request.interval_secs, Some(1));
    }

    #[test]
    fn malformed_requests_are_reported() {
        assert_eq!(parse_request(&[]), Err(IperfParseError::MissingRole));
        assert_eq!(
            parse_request(&["-s", "-c", "host"]),
            Err(IperfParseError::ConflictingRole)
        );
        assert_eq!(parse_request(&["-c"]), Err(IperfParseError::MissingValue("-c")));
        assert_eq!(
            parse_request(&["-s", "-p", "99999"]),
            Err(IperfParseError::InvalidValue("99999"))
        );
        assert_eq!(
            parse_request(&["-s", "-x"]),
            Err(IperfParseError::UnknownOption("-x"))
        );
    }
}

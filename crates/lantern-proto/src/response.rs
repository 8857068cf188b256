//! The closed catalog of numeric replies.
//!
//! Every entry carries a `%s` template. The number of `%s` slots is the
//! reply's arity; rendering with fewer arguments is a bug in the caller and
//! panics. The first slot is always the target (nickname or `*`).

#![allow(non_camel_case_types)]

/// Numeric reply codes known to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Response {
    /// 001
    RPL_WELCOME = 1,
    /// 002
    RPL_YOURHOST = 2,
    /// 003
    RPL_CREATED = 3,
    /// 004
    RPL_MYINFO = 4,
    /// 005
    RPL_ISUPPORT = 5,
    /// 221
    RPL_UMODEIS = 221,
    /// 322
    RPL_LIST = 322,
    /// 323
    RPL_LISTEND = 323,
    /// 324
    RPL_CHANNELMODEIS = 324,
    /// 331
    RPL_NOTOPIC = 331,
    /// 332
    RPL_TOPIC = 332,
    /// 333
    RPL_TOPICWHOTIME = 333,
    /// 353
    RPL_NAMREPLY = 353,
    /// 366
    RPL_ENDOFNAMES = 366,
    /// 372
    RPL_MOTD = 372,
    /// 375
    RPL_MOTDSTART = 375,
    /// 376
    RPL_ENDOFMOTD = 376,
    /// 381
    RPL_YOUREOPER = 381,
    /// 400
    ERR_UNKNOWNERROR = 400,
    /// 401
    ERR_NOSUCHNICK = 401,
    /// 403
    ERR_NOSUCHCHANNEL = 403,
    /// 404
    ERR_CANNOTSENDTOCHAN = 404,
    /// 411
    ERR_NORECIPIENT = 411,
    /// 412
    ERR_NOTEXTTOSEND = 412,
    /// 421
    ERR_UNKNOWNCOMMAND = 421,
    /// 422
    ERR_NOMOTD = 422,
    /// 431
    ERR_NONICKNAMEGIVEN = 431,
    /// 432
    ERR_ERRONEUSNICKNAME = 432,
    /// 433
    ERR_NICKNAMEINUSE = 433,
    /// 441
    ERR_USERNOTINCHANNEL = 441,
    /// 442
    ERR_NOTONCHANNEL = 442,
    /// 451
    ERR_NOTREGISTERED = 451,
    /// 461
    ERR_NEEDMOREPARAMS = 461,
    /// 462
    ERR_ALREADYREGISTRED = 462,
    /// 464
    ERR_PASSWDMISMATCH = 464,
    /// 471
    ERR_CHANNELISFULL = 471,
    /// 472
    ERR_UNKNOWNMODE = 472,
    /// 475
    ERR_BADCHANNELKEY = 475,
    /// 476
    ERR_BADCHANMASK = 476,
    /// 481
    ERR_NOPRIVILEGES = 481,
    /// 482
    ERR_CHANOPRIVSNEEDED = 482,
    /// 491
    ERR_NOOPERHOST = 491,
    /// 501
    ERR_UMODEUNKNOWNFLAG = 501,
    /// 502
    ERR_USERSDONTMATCH = 502,
    /// 974
    ERR_CANNOTCHANGEUMODE = 974,
}

impl Response {
    /// Numeric value.
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Three-digit wire form, e.g. `"001"`.
    pub fn code_str(self) -> String {
        format!("{:03}", self.code())
    }

    /// The parameter template, without the leading `:server code`.
    pub fn template(self) -> &'static str {
        use Response::*;
        match self {
            RPL_WELCOME => "%s :Welcome to the %s IRC Network %s",
            RPL_YOURHOST => "%s :Your host is %s, running version %s",
            RPL_CREATED => "%s :This server was created %s",
            RPL_MYINFO => "%s %s %s %s %s",
            RPL_ISUPPORT => "%s :are supported by this server",
            RPL_UMODEIS => "%s %s",
            RPL_LIST => "%s %s %s :%s",
            RPL_LISTEND => "%s :End of /LIST",
            RPL_CHANNELMODEIS => "%s %s",
            RPL_NOTOPIC => "%s %s :No topic is set",
            RPL_TOPIC => "%s %s :%s",
            RPL_TOPICWHOTIME => "%s %s %s %s",
            RPL_NAMREPLY => "%s %s %s :%s",
            RPL_ENDOFNAMES => "%s %s :End of /NAMES list",
            RPL_MOTD => "%s :- %s",
            RPL_MOTDSTART => "%s :- %s Message of the day - ",
            RPL_ENDOFMOTD => "%s :End of /MOTD command",
            RPL_YOUREOPER => "%s :You are now an IRC operator",
            ERR_UNKNOWNERROR => "%s %s :%s",
            ERR_NOSUCHNICK => "%s %s :No such nick/channel",
            ERR_NOSUCHCHANNEL => "%s %s :No such channel",
            ERR_CANNOTSENDTOCHAN => "%s %s :Cannot send to channel",
            ERR_NORECIPIENT => "%s :No recipient given (%s)",
            ERR_NOTEXTTOSEND => "%s :No text to send",
            ERR_UNKNOWNCOMMAND => "%s %s :Unknown command",
            ERR_NOMOTD => "%s :MOTD File is missing",
            ERR_NONICKNAMEGIVEN => "%s :No nickname given",
            ERR_ERRONEUSNICKNAME => "%s %s :Erroneous nickname",
            ERR_NICKNAMEINUSE => "%s %s :Nickname is already in use",
            ERR_USERNOTINCHANNEL => "%s %s %s :They aren't on that channel",
            ERR_NOTONCHANNEL => "%s %s :You're not on that channel",
            ERR_NOTREGISTERED => "%s :You have not registered",
            ERR_NEEDMOREPARAMS => "%s %s :Not enough parameters",
            ERR_ALREADYREGISTRED => "%s :Unauthorized command (already registered)",
            ERR_PASSWDMISMATCH => "%s :Password incorrect",
            ERR_CHANNELISFULL => "%s %s :Cannot join channel (+l)",
            ERR_UNKNOWNMODE => "%s %s :is unknown mode char to me for %s",
            ERR_BADCHANNELKEY => "%s %s :Cannot join channel (+k)",
            ERR_BADCHANMASK => "%s %s :Bad Channel Mask",
            ERR_NOPRIVILEGES => "%s :Permission Denied- You're not an IRC operator",
            ERR_CHANOPRIVSNEEDED => "%s %s :You're not channel operator",
            ERR_NOOPERHOST => "%s :No O-lines for your host",
            ERR_UMODEUNKNOWNFLAG => "%s %s :Unknown MODE flag",
            ERR_USERSDONTMATCH => "%s :Can't change mode for other users",
            ERR_CANNOTCHANGEUMODE => "%s %s :Can't set this mode",
        }
    }

    /// Number of arguments the template consumes.
    pub fn arity(self) -> usize {
        self.template().matches("%s").count()
    }

    /// Fill the template slot by slot.
    ///
    /// Returns the parameters and whether the last one is trailing. Each
    /// argument lands in exactly the parameter its slot belongs to, whatever
    /// it contains. A value that cannot stand as a middle parameter (empty,
    /// or holding a space or a leading `:`) is sent as `*` instead.
    ///
    /// # Panics
    ///
    /// Panics when fewer than [`arity`](Self::arity) arguments are given.
    /// Extra arguments are ignored.
    pub fn params(self, args: &[&str]) -> (Vec<String>, bool) {
        let arity = self.arity();
        assert!(
            args.len() >= arity,
            "{:?} needs {} arguments, got {}",
            self,
            arity,
            args.len()
        );

        let mut args = args.iter();
        let mut params = Vec::new();
        let mut rest = self.template();
        while !rest.is_empty() {
            if let Some(text) = rest.strip_prefix(':') {
                params.push(fill(text, &mut args, |arg| arg));
                return (params, true);
            }
            let end = rest.find(' ').unwrap_or(rest.len());
            params.push(fill(&rest[..end], &mut args, middle_safe));
            rest = rest[end..].trim_start_matches(' ');
        }
        (params, false)
    }
}

fn middle_safe(arg: &str) -> &str {
    if arg.is_empty() || arg.starts_with(':') || arg.contains([' ', '\t']) {
        "*"
    } else {
        arg
    }
}

/// Replace each `%s` in `piece` with the next argument.
fn fill<'a>(
    piece: &str,
    args: &mut std::slice::Iter<'_, &'a str>,
    clean: impl Fn(&'a str) -> &'a str,
) -> String {
    let mut out = String::with_capacity(piece.len());
    let mut pieces = piece.split("%s");
    if let Some(first) = pieces.next() {
        out.push_str(first);
    }
    for piece in pieces {
        if let Some(arg) = args.next() {
            out.push_str(clean(*arg));
        }
        out.push_str(piece);
    }
    out
}

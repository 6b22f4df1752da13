use anyhow::{bail, Context};
use itertools::Itertools;

use libmailaddr::email::header_layout::write_list_wrap;
use libmailaddr::email::split_header;
use libmailaddr::email::idn::{addrlist_to_intl, for_display};
use libmailaddr::email::rfc2047::{decode, decode_addrlist, encode, encode_addrlist};
use libmailaddr::{AddressHeader, AddressList, Config};

const USAGE: &str =
    "usage: mailaddr [--decode|--encode] [--header NAME | --raw] [--charset CS] VALUE...";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Show,
    Decode,
    Encode,
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn main() -> anyhow::Result<()> {
    let mut mode = Mode::Show;
    let mut header = "To".to_string();
    let mut raw = false;
    let mut config = Config::default();
    let mut values = vec![];

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--decode" => mode = Mode::Decode,
            "--encode" => mode = Mode::Encode,
            "--header" => header = args.next().context("--header needs a value")?,
            "--raw" => raw = true,
            "--charset" => {
                let cs = args.next().context("--charset needs a value")?;
                config = config.with_charset(&cs);
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            s if s.starts_with("--") => bail!("unknown option {}\n{}", s, USAGE),
            _ => values.push(arg),
        }
    }
    if values.is_empty() {
        bail!(USAGE);
    }
    let mut value = values.iter().join(" ");
    if raw {
        // A whole header line, possibly folded: `Name: value`.
        let (name, unfolded) =
            split_header(value.as_bytes()).context("expected a `Name: value` header line")?;
        header = String::from_utf8_lossy(name).into_owned();
        value = String::from_utf8_lossy(&unfolded).into_owned();
    }

    if AddressHeader::from_name(&header).is_none() {
        // Unstructured text, e.g. a subject.
        let col = header.len() + 2;
        let out = match mode {
            Mode::Show => value.into_bytes(),
            Mode::Decode => decode(value.as_bytes(), &config)
                .with_context(|| format!("cannot decode {}", value))?,
            Mode::Encode => encode(value.as_bytes(), None, col, &config.send_charset, &config)
                .with_context(|| format!("cannot encode {}", value))?,
        };
        println!("{}: {}", header, lossy(&out));
        return Ok(());
    }

    let mut list = AddressList::parse(value.as_bytes())
        .with_context(|| format!("cannot parse {}", value))?;
    match mode {
        Mode::Show => {}
        Mode::Decode => decode_addrlist(&mut list, &config),
        Mode::Encode => {
            addrlist_to_intl(&mut list, &config).context("cannot convert domains")?;
            encode_addrlist(&mut list, Some(&header), &config)
                .context("cannot encode personal names")?;
        }
    }

    for a in list.iter() {
        if a.is_group_open() {
            println!("group {}", lossy(a.mailbox.as_deref().unwrap_or_default()));
        } else if a.is_group_close() {
            println!("end of group");
        } else {
            let mailbox = for_display(a, &config).unwrap_or_default();
            match &a.personal {
                Some(p) => println!("  {} <{}>", lossy(p), lossy(&mailbox)),
                None => println!("  <{}>", lossy(&mailbox)),
            }
        }
    }
    println!("{}", lossy(&write_list_wrap(&list, Some(&header), &config)));
    Ok(())
}

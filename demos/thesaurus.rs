use std::ffi::CStr;
use std::ffi::CString;
use std::ffi::c_char;
use std::fs;
use std::io;
use std::io::Write as _;
use std::process::exit;

use chain_map::ByteMap;
use chain_map::StrideVec;
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    path: String,

    #[arg(short = 'b', long = "buckets", default_value_t = 35_000)]
    buckets: usize,
}

/// Every stored value and synonym element is one raw pointer, round-tripped
/// through fixed-width bytes.
const PTR_SIZE: usize = std::mem::size_of::<usize>();

fn decode_addr(bytes: &[u8]) -> usize {
    usize::from_ne_bytes(bytes.try_into().unwrap())
}

/// A synonym list owns its strings: each element is a raw `CString` pointer
/// that the list's cleanup callback reclaims.
fn new_synonym_list() -> StrideVec {
    StrideVec::with_cleanup(
        PTR_SIZE,
        16,
        Box::new(|elem| {
            // SAFETY: The element was pushed as a `CString::into_raw` pointer
            // and each element is destroyed exactly once.
            drop(unsafe { CString::from_raw(decode_addr(elem) as *mut c_char) });
        }),
    )
}

fn main() {
    let args = Args::parse();

    let text = fs::read_to_string(&args.path).unwrap_or_else(|err| {
        eprintln!("could not read {}: {err}", args.path);
        exit(1);
    });

    // word -> boxed synonym list. The map owns the lists through its cleanup
    // callback, and each list owns its strings through its own.
    let mut thesaurus = ByteMap::with_cleanup(
        PTR_SIZE,
        args.buckets,
        Box::new(|value| {
            // SAFETY: The value bytes hold a `Box::into_raw` list pointer and
            // each entry is destroyed exactly once.
            drop(unsafe { Box::from_raw(decode_addr(value) as *mut StrideVec) });
        }),
    );

    print!("Loading thesaurus..");
    io::stdout().flush().ok();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            print!(" ({comment})");
            continue;
        }

        // cold,arctic,blustery,... : the first field is the headword and the
        // rest of the line its synonyms.
        let mut fields = line.split(',');
        let headword = fields.next().expect("split yields at least one field");
        let mut synonyms = new_synonym_list();
        for synonym in fields {
            let synonym = CString::new(synonym).expect("thesaurus entries contain no NUL");
            synonyms.push(&(CString::into_raw(synonym) as usize).to_ne_bytes());
        }

        // Overwriting would leak the superseded list: reclaim it first.
        if let Some(stale) = thesaurus.get(headword.as_bytes()).map(decode_addr) {
            // SAFETY: As for the map's cleanup callback; the `put` below
            // replaces the encoding, so it is reclaimed exactly once.
            drop(unsafe { Box::from_raw(stale as *mut StrideVec) });
        }
        thesaurus.put(
            headword.as_bytes(),
            &(Box::into_raw(Box::new(synonyms)) as usize).to_ne_bytes(),
        );

        if thesaurus.len() % 1000 == 0 {
            print!(".");
            io::stdout().flush().ok();
        }
    }
    println!(".done. {} headwords", thesaurus.len());

    loop {
        print!("\nEnter word (RETURN to exit): ");
        io::stdout().flush().ok();
        let mut response = String::new();
        if io::stdin().read_line(&mut response).unwrap_or(0) == 0 {
            break;
        }
        let word = response.trim_end();
        if word.is_empty() {
            break;
        }

        match thesaurus.get(word.as_bytes()).map(decode_addr) {
            Some(addr) => {
                // SAFETY: The address encodes a live list owned by the map,
                // and the map is not mutated while this borrow lasts.
                let list = unsafe { &*(addr as *const StrideVec) };
                let synonyms: Vec<String> = list
                    .iter()
                    .map(|elem| {
                        let addr = decode_addr(elem);
                        // SAFETY: Each element is a live `CString::into_raw`
                        // pointer owned by the list.
                        unsafe { CStr::from_ptr(addr as *const c_char) }
                            .to_string_lossy()
                            .into_owned()
                    })
                    .collect();
                println!("{word}: {{{}}}", synonyms.join(", "));
            }
            None => println!("Nothing found for \"{word}\". Try again."),
        }
    }
}

use std::ffi::CStr;
use std::ffi::CString;
use std::ffi::c_char;
use std::fs;
use std::process::exit;

use chain_map::ByteMap;
use chain_map::StrideVec;
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    path: String,

    #[arg(short = 'n', long = "top", default_value_t = 10)]
    top: usize,

    #[arg(short = 'b', long = "buckets", default_value_t = 0)]
    buckets: usize,
}

/// Counter width in the map and at the front of each ranking element.
const COUNT_SIZE: usize = 8;

/// One ranking element: the occurrence count followed by a raw `CString`
/// pointer to the word, so the vector owns the word text and its cleanup
/// callback can release it.
const RANK_ELEM_SIZE: usize = COUNT_SIZE + std::mem::size_of::<usize>();

fn decode_count(bytes: &[u8]) -> u64 {
    u64::from_ne_bytes(bytes[..COUNT_SIZE].try_into().unwrap())
}

fn main() {
    let args = Args::parse();

    let text = fs::read(&args.path).unwrap_or_else(|err| {
        eprintln!("could not read {}: {err}", args.path);
        exit(1);
    });
    println!("Counting words in {} ({} bytes)", args.path, text.len());

    let mut counts = ByteMap::with_buckets(COUNT_SIZE, args.buckets);

    let mut word = Vec::new();
    for token in text.split(|byte| !byte.is_ascii_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        word.clear();
        word.extend(token.iter().map(u8::to_ascii_lowercase));

        match counts.get_mut(&word) {
            Some(slot) => {
                let n = decode_count(slot);
                slot.copy_from_slice(&(n + 1).to_ne_bytes());
            }
            None => counts.put(&word, &1u64.to_ne_bytes()),
        }
    }

    // Total the counters with the stateless traversal; each step re-derives
    // its position from the previous key.
    let mut total: u64 = 0;
    let mut key = counts.first().map(<[u8]>::to_vec);
    while let Some(current) = key {
        total += decode_count(counts.get(&current).expect("traversal yields live keys"));
        key = counts.next(&current).map(<[u8]>::to_vec);
    }
    println!("Found {} occurrences of {} distinct words", total, counts.len());

    let mut ranked = StrideVec::with_cleanup(
        RANK_ELEM_SIZE,
        counts.len(),
        Box::new(|elem| {
            let addr = usize::from_ne_bytes(elem[COUNT_SIZE..].try_into().unwrap());
            // SAFETY: The pointer was produced by `CString::into_raw` when the
            // element was pushed, and each element is destroyed exactly once.
            drop(unsafe { CString::from_raw(addr as *mut c_char) });
        }),
    );

    for (key, value) in counts.iter() {
        let word = CString::new(key).expect("map keys contain no NUL");
        let mut elem = [0u8; RANK_ELEM_SIZE];
        elem[..COUNT_SIZE].copy_from_slice(value);
        elem[COUNT_SIZE..].copy_from_slice(&(CString::into_raw(word) as usize).to_ne_bytes());
        ranked.push(&elem);
    }

    // Descending by count; the stable sort keeps ties in visitation order.
    ranked.sort_by(|a, b| decode_count(b).cmp(&decode_count(a)));

    println!("\nTop {} words:", args.top.min(ranked.len()));
    for elem in ranked.iter().take(args.top) {
        let count = decode_count(elem);
        let addr = usize::from_ne_bytes(elem[COUNT_SIZE..].try_into().unwrap());
        // SAFETY: The pointer came from `CString::into_raw`; the string stays
        // live until `ranked` is dropped below.
        let word = unsafe { CStr::from_ptr(addr as *const c_char) };
        println!("{count:>8}  {}", word.to_string_lossy());
    }

    println!();
    counts.chain_stats().print();
}

//! Extent descriptors printed by `xfs_db ... bmap`
//!
//! ```text
//! data offset <off> startblock <blk> (<agno>/<agbno>) count <n> flag <f>
//! ```
//!
//! The parse is strict: a misread offset would silently shift every byte
//! copied after it.

use std::fmt;

use nom::bytes::complete::tag;
use nom::character::complete::{char, u32 as dec_u32, u64 as dec_u64};
use nom::combinator::all_consuming;
use nom::sequence::{delimited, preceded, separated_pair, tuple};
use nom::IResult;
use serde::Serialize;

use crate::error::{Result, XfsAidError};

/// One contiguous run of blocks backing a contiguous logical range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    /// Position of this extent within the file's block map
    pub index: usize,
    pub blocksize: u64,
    /// Number of blocks
    pub count: u64,
    /// First logical block within the file
    pub startoffset: u64,
    /// One past the last logical block
    pub endoffset: u64,
    /// First physical block on the device
    pub startblock: u64,
    /// One past the last physical block
    pub endblock: u64,
    pub agno: u32,
    /// First block relative to the allocation group
    pub agbno: u64,
    pub flag: u32,
}

struct Descriptor {
    offset: u64,
    startblock: u64,
    agno: u32,
    agbno: u64,
    count: u64,
    flag: u32,
}

fn descriptor(input: &str) -> IResult<&str, Descriptor> {
    let (input, (offset, startblock, (agno, agbno), count, flag)) = tuple((
        preceded(tag("data offset "), dec_u64),
        preceded(tag(" startblock "), dec_u64),
        preceded(
            char(' '),
            delimited(char('('), separated_pair(dec_u32, char('/'), dec_u64), char(')')),
        ),
        preceded(tag(" count "), dec_u64),
        preceded(tag(" flag "), dec_u32),
    ))(input)?;
    Ok((
        input,
        Descriptor {
            offset,
            startblock,
            agno,
            agbno,
            count,
            flag,
        },
    ))
}

impl Extent {
    /// Parse the `index`-th line of a block map
    pub fn parse(index: usize, blocksize: u64, line: &str) -> Result<Self> {
        let malformed = || XfsAidError::BlockmapParse {
            text: line.to_string(),
        };
        let (_, d) = all_consuming(descriptor)(line.trim_end()).map_err(|_| malformed())?;
        Ok(Self {
            index,
            blocksize,
            count: d.count,
            startoffset: d.offset,
            endoffset: d.offset.checked_add(d.count).ok_or_else(malformed)?,
            startblock: d.startblock,
            endblock: d.startblock.checked_add(d.count).ok_or_else(malformed)?,
            agno: d.agno,
            agbno: d.agbno,
            flag: d.flag,
        })
    }

    /// Byte length covered by this extent
    pub fn byte_len(&self) -> u64 {
        self.count.saturating_mul(self.blocksize)
    }
}

/// `extent: [startoffset..endoffset]: startblock..endblock`
impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}..{}]: {}..{}",
            self.index, self.startoffset, self.endoffset, self.startblock, self.endblock
        )
    }
}

/// Parse a whole `bmap` reply, numbering extents by line order
pub fn parse_block_map(blocksize: u64, text: &str) -> Result<Vec<Extent>> {
    text.lines()
        .enumerate()
        .map(|(index, line)| Extent::parse(index, blocksize, line))
        .collect()
}

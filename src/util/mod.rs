pub mod dna;
pub mod twobit;

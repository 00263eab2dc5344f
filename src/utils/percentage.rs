use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;

/// CPU load as reported by an ambient sampler.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if !(0. ..=100.).contains(&value) {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // This means that 100%% also works, but I think I'm fine with that
        let s = s.trim().trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::Percentage;

    #[test]
    fn test_parse_percentage() {
        assert_eq!(*"45%".parse::<Percentage>().unwrap(), 45.);
        assert_eq!(*" 12.5 ".parse::<Percentage>().unwrap(), 12.5);
        assert!("-1".parse::<Percentage>().is_err());
        assert!("101%".parse::<Percentage>().is_err());
        assert!("lots".parse::<Percentage>().is_err());
    }
}

//! Demographic class labels.
//!
//! Speakers are bucketed by age bracket and gender into four classes whose
//! integer ids are the labels every estimator in this crate trains on.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DemographicClass {
    TwentiesFemale,
    TwentiesMale,
    FiftiesFemale,
    FiftiesMale,
}

impl DemographicClass {
    pub const ALL: [DemographicClass; 4] = [
        DemographicClass::TwentiesFemale,
        DemographicClass::TwentiesMale,
        DemographicClass::FiftiesFemale,
        DemographicClass::FiftiesMale,
    ];

    /// Map the `age` and `gender` columns of a feature table to a class.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Any other age bracket or gender yields `None`.
    pub fn from_age_gender(age: &str, gender: &str) -> Option<Self> {
        let age = age.trim().to_ascii_lowercase();
        let gender = gender.trim().to_ascii_lowercase();
        match (age.as_str(), gender.as_str()) {
            ("twenties", "female") => Some(DemographicClass::TwentiesFemale),
            ("twenties", "male") => Some(DemographicClass::TwentiesMale),
            ("fifties", "female") => Some(DemographicClass::FiftiesFemale),
            ("fifties", "male") => Some(DemographicClass::FiftiesMale),
            _ => None,
        }
    }

    pub fn label(self) -> i32 {
        match self {
            DemographicClass::TwentiesFemale => 0,
            DemographicClass::TwentiesMale => 1,
            DemographicClass::FiftiesFemale => 2,
            DemographicClass::FiftiesMale => 3,
        }
    }

    pub fn from_label(label: i32) -> Option<Self> {
        usize::try_from(label)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// 1 for the fifties bracket, 0 for twenties.
    pub fn age_bit(self) -> i32 {
        self.label() / 2
    }

    /// 1 for male, 0 for female.
    pub fn gender_bit(self) -> i32 {
        self.label() % 2
    }

    /// Inverse of `age_bit`/`gender_bit`. The class label is `age * 2 + gender`.
    pub fn from_bits(age_bit: i32, gender_bit: i32) -> Option<Self> {
        if !(0..2).contains(&age_bit) || !(0..2).contains(&gender_bit) {
            return None;
        }
        Self::from_label(age_bit * 2 + gender_bit)
    }

    pub fn name(self) -> &'static str {
        match self {
            DemographicClass::TwentiesFemale => "twenties_female",
            DemographicClass::TwentiesMale => "twenties_male",
            DemographicClass::FiftiesFemale => "fifties_female",
            DemographicClass::FiftiesMale => "fifties_male",
        }
    }
}

impl fmt::Display for DemographicClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DemographicClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.name() == lowered)
            .ok_or_else(|| {
                format!(
                    "Unknown demographic class: {}. Valid options are: twenties_female, twenties_male, fifties_female, fifties_male",
                    s
                )
            })
    }
}

/// What an ensemble is trained to predict.
///
/// `Class` uses the four demographic classes. `Gender` and `Age` project
/// them onto a single binary attribute, so a gender model and an age model
/// can be trained separately and combined at inference time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelTarget {
    #[default]
    Class,
    Gender,
    Age,
}

impl LabelTarget {
    pub fn n_classes(self) -> usize {
        match self {
            LabelTarget::Class => DemographicClass::ALL.len(),
            LabelTarget::Gender | LabelTarget::Age => 2,
        }
    }

    pub fn project(self, class: DemographicClass) -> i32 {
        match self {
            LabelTarget::Class => class.label(),
            LabelTarget::Gender => class.gender_bit(),
            LabelTarget::Age => class.age_bit(),
        }
    }

    /// Project a class label; `None` when `label` is not a demographic class.
    pub fn project_label(self, label: i32) -> Option<i32> {
        DemographicClass::from_label(label).map(|class| self.project(class))
    }

    /// Display name of a label predicted for this target.
    pub fn label_name(self, label: i32) -> Option<&'static str> {
        match (self, label) {
            (LabelTarget::Class, _) => DemographicClass::from_label(label).map(|c| c.name()),
            (LabelTarget::Gender, 0) => Some("female"),
            (LabelTarget::Gender, 1) => Some("male"),
            (LabelTarget::Age, 0) => Some("twenties"),
            (LabelTarget::Age, 1) => Some("fifties"),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LabelTarget::Class => "class",
            LabelTarget::Gender => "gender",
            LabelTarget::Age => "age",
        }
    }
}

impl fmt::Display for LabelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "class" => Ok(LabelTarget::Class),
            "gender" => Ok(LabelTarget::Gender),
            "age" => Ok(LabelTarget::Age),
            _ => Err(format!(
                "Unknown label target: {}. Valid options are: class, gender, age",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_gender_mapping() {
        assert_eq!(
            DemographicClass::from_age_gender("twenties", "female").map(|c| c.label()),
            Some(0)
        );
        assert_eq!(
            DemographicClass::from_age_gender("twenties", "male").map(|c| c.label()),
            Some(1)
        );
        assert_eq!(
            DemographicClass::from_age_gender(" Fifties", "FEMALE").map(|c| c.label()),
            Some(2)
        );
        assert_eq!(
            DemographicClass::from_age_gender("fifties", "male").map(|c| c.label()),
            Some(3)
        );
        assert_eq!(DemographicClass::from_age_gender("thirties", "male"), None);
        assert_eq!(DemographicClass::from_age_gender("fifties", "other"), None);
    }

    #[test]
    fn test_label_round_trip() {
        for class in DemographicClass::ALL {
            assert_eq!(DemographicClass::from_label(class.label()), Some(class));
            assert_eq!(class.name().parse::<DemographicClass>(), Ok(class));
        }
        assert_eq!(DemographicClass::from_label(-1), None);
        assert_eq!(DemographicClass::from_label(4), None);
    }

    #[test]
    fn test_bits_match_label_layout() {
        for class in DemographicClass::ALL {
            assert_eq!(class.label(), class.age_bit() * 2 + class.gender_bit());
            assert_eq!(
                DemographicClass::from_bits(class.age_bit(), class.gender_bit()),
                Some(class)
            );
        }
        assert_eq!(DemographicClass::FiftiesFemale.age_bit(), 1);
        assert_eq!(DemographicClass::FiftiesFemale.gender_bit(), 0);
        assert_eq!(DemographicClass::from_bits(2, 0), None);
        assert_eq!(DemographicClass::from_bits(0, -1), None);
    }

    #[test]
    fn test_label_target_projection() {
        let class = DemographicClass::TwentiesMale;
        assert_eq!(LabelTarget::Class.project(class), 1);
        assert_eq!(LabelTarget::Gender.project(class), 1);
        assert_eq!(LabelTarget::Age.project(class), 0);
        assert_eq!(LabelTarget::Age.project_label(2), Some(1));
        assert_eq!(LabelTarget::Gender.project_label(7), None);

        assert_eq!(LabelTarget::Gender.label_name(0), Some("female"));
        assert_eq!(LabelTarget::Age.label_name(1), Some("fifties"));
        assert_eq!(LabelTarget::Age.label_name(2), None);
        assert_eq!(LabelTarget::Class.label_name(3), Some("fifties_male"));
    }

    #[test]
    fn test_label_target_from_str() {
        for target in [LabelTarget::Class, LabelTarget::Gender, LabelTarget::Age] {
            assert_eq!(target.to_string().parse::<LabelTarget>(), Ok(target));
        }
        assert_eq!("Gender".parse::<LabelTarget>(), Ok(LabelTarget::Gender));
        assert!("speaker".parse::<LabelTarget>().is_err());
        assert_eq!(LabelTarget::Class.n_classes(), 4);
        assert_eq!(LabelTarget::Age.n_classes(), 2);
    }
}

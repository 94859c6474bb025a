use serde::{Deserialize, Serialize};

/// The fixed set of extractable fields.
///
/// Every field carries its own extraction pattern, optional canonical
/// validation pattern, context window size, and context keyword set as
/// table data, so callers dispatch on the variant instead of on field-name
/// strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    CertNumber,
    ContractNumber,
    IdNumber,
    Address,
    HouseNumber,
    Area,
    Date,
    Money,
}

impl FieldKind {
    /// All fields, in extraction order.
    pub const ALL: [FieldKind; 8] = [
        FieldKind::CertNumber,
        FieldKind::ContractNumber,
        FieldKind::IdNumber,
        FieldKind::Address,
        FieldKind::HouseNumber,
        FieldKind::Area,
        FieldKind::Date,
        FieldKind::Money,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::CertNumber => "cert_number",
            FieldKind::ContractNumber => "contract_number",
            FieldKind::IdNumber => "id_number",
            FieldKind::Address => "address",
            FieldKind::HouseNumber => "house_number",
            FieldKind::Area => "area",
            FieldKind::Date => "date",
            FieldKind::Money => "money",
        }
    }

    /// Regex used to find raw candidates in document text.
    pub(crate) fn extraction_pattern(self) -> &'static str {
        match self {
            // e.g. 京(2023)朝阳区不动产权第0012345号
            FieldKind::CertNumber => r"[\p{Han}]\(\d{4}\)[\p{Han}]{2,10}第[0-9A-Z\-]+号",
            // keyword-anchored; the code itself is the last capture group
            FieldKind::ContractNumber => {
                r"(?:合同编号|协议编号|合同号|编号)[:：]?\s*([A-Z0-9][A-Z0-9\-]{4,})"
            }
            // 18-digit resident id, checksum char included. No boundary
            // assertions: CJK neighbours count as word chars, which would
            // suppress matches after 号/码.
            FieldKind::IdNumber => {
                r"[1-9]\d{5}(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{3}[0-9Xx]"
            }
            FieldKind::Address => r"[\p{Han}]{2,6}市[\p{Han}]{2,8}(?:区|县)[\p{Han}\d\-]{2,60}",
            FieldKind::HouseNumber => {
                r"\d{1,3}(?:号楼|栋|幢)(?:\d{1,3}单元)?\d{1,4}(?:室|号)?|\d{1,3}[-－]\d{1,4}"
            }
            FieldKind::Area => r"\d+(?:\.\d+)?\s*(?:平方米|㎡|平米)",
            FieldKind::Date => r"\d{4}年\d{1,2}月\d{1,2}日|\d{4}[-/]\d{1,2}[-/]\d{1,2}",
            // two alternates: currency-prefixed (元 optional) or 元-suffixed
            FieldKind::Money => {
                r"(?:人民币|RMB|[¥￥])\s*(?P<amt_c>[\d,]+(?:\.\d+)?)(?P<unit_c>万|亿)?元?|(?P<amt>[\d,]+(?:\.\d+)?)(?P<unit>万|亿)?元"
            }
        }
    }

    /// Canonical pattern a selected value is re-checked against when scoring.
    /// Address and house number carry none; their surface forms are too free.
    pub(crate) fn canonical_pattern(self) -> Option<&'static str> {
        match self {
            FieldKind::CertNumber => Some(r"^[\p{Han}]\(\d{4}\)[\p{Han}]{2,}第[0-9A-Z\-]+号$"),
            FieldKind::ContractNumber => Some(r"^[A-Z0-9\-]{5,}$"),
            FieldKind::IdNumber => Some(
                r"^[1-9]\d{5}(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{3}[0-9Xx]$",
            ),
            FieldKind::Address => None,
            FieldKind::HouseNumber => None,
            FieldKind::Area => Some(r"^\d+(?:\.\d+)?\s*(?:平方米|㎡|平米)$"),
            FieldKind::Date => Some(r"^(?:\d{4}年\d{1,2}月\d{1,2}日|\d{4}[-/]\d{1,2}[-/]\d{1,2})$"),
            FieldKind::Money => Some(r"^[\d,]+(?:\.\d+)?(?:万|亿)?元$"),
        }
    }

    /// Context window, in chars, sliced on each side of a match.
    pub fn context_window(self) -> usize {
        match self {
            FieldKind::CertNumber => 100,
            FieldKind::ContractNumber => 100,
            FieldKind::IdNumber => 50,
            FieldKind::Address => 150,
            FieldKind::HouseNumber => 80,
            FieldKind::Area => 50,
            FieldKind::Date => 50,
            FieldKind::Money => 80,
        }
    }

    /// Keywords whose presence near a match raises its context score.
    pub fn context_keywords(self) -> &'static [&'static str] {
        match self {
            FieldKind::CertNumber => &["证号", "不动产权", "证书编号", "权证"],
            FieldKind::ContractNumber => &["合同", "编号", "协议"],
            FieldKind::IdNumber => &["身份证", "证件", "号码"],
            FieldKind::Address => &["地址", "坐落", "位于", "位置"],
            FieldKind::HouseNumber => &["房号", "室号", "单元", "房屋"],
            FieldKind::Area => &["面积", "建筑", "使用"],
            FieldKind::Date => &["日期", "签发", "签订", "登记"],
            FieldKind::Money => &["金额", "价款", "总价", "人民币"],
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{char, one_of},
    combinator::{all_consuming, map, value, verify},
    multi::{many0, many1_count},
    sequence::delimited,
};

use crate::consts::ConstantType;

pub const MAX_ARRAY_DIMENSIONS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor(pub(crate) FieldType);

impl FieldDescriptor {
    pub fn field_type(&self) -> &FieldType {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub(crate) parameters: Vec<FieldType>,
    pub(crate) return_type: ReturnType,
}

impl MethodDescriptor {
    pub fn parameters(&self) -> &[FieldType] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&FieldType> {
        self.return_type.as_ref()
    }
}

pub type ReturnType = Option<FieldType>;

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Object(String),
    Short,
    Boolean,
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn is_wide(&self) -> bool {
        matches!(self, FieldType::Long | FieldType::Double)
    }

    /// Pool entry kind a `ConstantValue` attribute must point at for a field
    /// of this type, if the type can have one at all.
    pub fn constant_type(&self) -> Option<ConstantType> {
        match self {
            FieldType::Byte
            | FieldType::Char
            | FieldType::Short
            | FieldType::Int
            | FieldType::Boolean => Some(ConstantType::Integer),
            FieldType::Float => Some(ConstantType::Float),
            FieldType::Long => Some(ConstantType::Long),
            FieldType::Double => Some(ConstantType::Double),
            FieldType::Object(class_name) if class_name == "java/lang/String" => {
                Some(ConstantType::String)
            }
            FieldType::Object(_) | FieldType::Array(_) => None,
        }
    }
}

pub fn parse_field_descriptor(input: &str) -> IResult<&str, FieldDescriptor> {
    all_consuming(map(parse_field_type, FieldDescriptor)).parse(input)
}

pub fn parse_method_descriptor(input: &str) -> IResult<&str, MethodDescriptor> {
    all_consuming(map(
        (
            delimited(char('('), many0(parse_field_type), char(')')),
            parse_return_type_descriptor,
        ),
        |(parameters, return_type): (Vec<FieldType>, ReturnType)| MethodDescriptor {
            parameters,
            return_type,
        },
    ))
    .parse(input)
}

pub fn parse_return_type_descriptor(input: &str) -> IResult<&str, ReturnType> {
    alt((map(parse_field_type, Some), value(None, char('V')))).parse(input)
}

pub fn is_valid_field_descriptor(descriptor: &str) -> bool {
    parse_field_descriptor(descriptor).is_ok()
}

pub fn is_valid_method_descriptor(descriptor: &str) -> bool {
    parse_method_descriptor(descriptor).is_ok()
}

fn parse_field_type(input: &str) -> IResult<&str, FieldType> {
    alt((parse_base_type, parse_object_type, parse_array_type)).parse(input)
}

fn parse_base_type(input: &str) -> IResult<&str, FieldType> {
    map(one_of("BCDFIJSZ"), |ch: char| match ch {
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'D' => FieldType::Double,
        'F' => FieldType::Float,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'S' => FieldType::Short,
        'Z' => FieldType::Boolean,
        _ => unreachable!(),
    })
    .parse(input)
}

fn parse_object_type(input: &str) -> IResult<&str, FieldType> {
    map(
        delimited(
            char('L'),
            verify(
                take_till1(|c: char| matches!(c, ';' | '.' | '[')),
                is_valid_class_name,
            ),
            char(';'),
        ),
        |class_name: &str| FieldType::Object(class_name.to_string()),
    )
    .parse(input)
}

fn parse_array_type(input: &str) -> IResult<&str, FieldType> {
    let (input, dimensions) = verify(many1_count(char('[')), |dimensions: &usize| {
        *dimensions <= MAX_ARRAY_DIMENSIONS
    })
    .parse(input)?;
    let (input, element) = alt((parse_base_type, parse_object_type)).parse(input)?;
    let field_type = (0..dimensions).fold(element, |inner, _| FieldType::Array(Box::new(inner)));
    Ok((input, field_type))
}

// binary names use '/' between non-empty segments
fn is_valid_class_name(name: &str) -> bool {
    !name.split('/').any(str::is_empty)
}

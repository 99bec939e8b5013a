use arrayvec::ArrayVec;
use cgmath::InnerSpace;

use crate::math::ONE_MINUS_EPSILON;
use crate::reflection::{BxDFType, Lobe, ScatterSample};
use crate::spectrum::Spectrum;
use crate::{coordinate_system, Float, Point2f, Vec3f};

pub const MAX_LOBES: usize = 4;

pub struct Bsdf {
    /// Index of refraction over the boundary
    pub eta: Float,

    /// Shading normal
    ns: Vec3f,

    /// Geometry normal
    ng: Vec3f,

    /// s orthonormal basis vector with the shading normal
    ss: Vec3f,

    /// t orthonormal basis vector with the shading normal
    ts: Vec3f,

    lobes: ArrayVec<Lobe, MAX_LOBES>,
}

impl Bsdf {
    /// `dpdu` only orients the tangent frame and may be zero.
    pub fn new(ns: Vec3f, ng: Vec3f, dpdu: Vec3f, eta: Float) -> Self {
        let tangent = dpdu - ns * ns.dot(dpdu);
        let ss = if tangent.magnitude2() > 1.0e-12 {
            tangent.normalize()
        } else {
            coordinate_system(ns).0
        };
        let ts = ns.cross(ss);

        Self {
            eta,
            ns,
            ng,
            ss,
            ts,
            lobes: ArrayVec::new(),
        }
    }

    pub fn add(&mut self, lobe: Lobe) {
        let pushed = self.lobes.try_push(lobe);
        debug_assert!(pushed.is_ok(), "more than {} lobes", MAX_LOBES);
    }

    pub fn lobes(&self) -> &[Lobe] {
        &self.lobes
    }

    pub fn num_components(&self, flags: BxDFType) -> usize {
        self.lobes.iter().filter(|lobe| lobe.matches_flags(flags)).count()
    }

    /// Whether any lobe can be evaluated for an arbitrary pair of directions.
    pub fn has_non_specular(&self) -> bool {
        self.lobes.iter().any(|lobe| !lobe.is_specular())
    }

    pub fn shading_normal(&self) -> Vec3f {
        self.ns
    }

    pub fn geometric_normal(&self) -> Vec3f {
        self.ng
    }

    pub fn world_to_local(&self, v: Vec3f) -> Vec3f {
        Vec3f::new(v.dot(self.ss), v.dot(self.ts), v.dot(self.ns))
    }

    pub fn local_to_world(&self, v: Vec3f) -> Vec3f {
        let x = self.ss.x * v.x + self.ts.x * v.y + self.ns.x * v.z;
        let y = self.ss.y * v.x + self.ts.y * v.y + self.ns.y * v.z;
        let z = self.ss.z * v.x + self.ts.z * v.y + self.ns.z * v.z;
        Vec3f::new(x, y, z)
    }

    /// Lobes that apply to the pair, chosen by which side of the geometric surface each lies on.
    fn side_matches(&self, lobe: &Lobe, reflect: bool) -> bool {
        let t = lobe.get_type();
        (reflect && t.contains(BxDFType::REFLECTION)) || (!reflect && t.contains(BxDFType::TRANSMISSION))
    }

    pub fn f(&self, wo_world: Vec3f, wi_world: Vec3f, flags: BxDFType) -> Spectrum {
        let wi = self.world_to_local(wi_world);
        let wo = self.world_to_local(wo_world);
        if wo.z == 0.0 { return Spectrum::black() }

        let reflect = wi_world.dot(self.ng) * wo_world.dot(self.ng) > 0.0;

        self.lobes.iter()
            .filter(|lobe| lobe.matches_flags(flags))
            .filter(|lobe| self.side_matches(lobe, reflect))
            .map(|lobe| lobe.f(wo, wi))
            .sum()
    }

    /// Picks one matching lobe with `u[0]` and samples it. The returned `wi` is in world space,
    /// and for non-specular lobes `f` and `pdf` cover every matching lobe.
    pub fn sample_f(&self, wo_world: Vec3f, u: Point2f, flags: BxDFType) -> Option<ScatterSample> {
        let matching = self.num_components(flags);
        if matching == 0 { return None }
        let matching_f = matching as Float;

        let comp = ((u[0] * matching_f).floor() as usize).min(matching - 1);
        let lobe = self.lobes.iter()
            .filter(|lobe| lobe.matches_flags(flags))
            .nth(comp)?;

        let u_remapped = Point2f::new(
            Float::min(u[0] * matching_f - comp as Float, ONE_MINUS_EPSILON),
            u[1],
        );

        let wo = self.world_to_local(wo_world);
        if wo.z == 0.0 { return None }
        let mut sample = lobe.sample_f(wo, u_remapped)?;
        if sample.pdf == 0.0 { return None }
        let wi_world = self.local_to_world(sample.wi);

        if !lobe.is_specular() && matching > 1 {
            sample.pdf = self.lobes.iter()
                .filter(|l| l.matches_flags(flags))
                .map(|l| l.pdf(wo, sample.wi))
                .sum();
        }
        if matching > 1 {
            sample.pdf /= matching_f;
        }

        if !lobe.is_specular() {
            let reflect = wi_world.dot(self.ng) * wo_world.dot(self.ng) > 0.0;
            sample.f = self.lobes.iter()
                .filter(|l| l.matches_flags(flags))
                .filter(|l| self.side_matches(l, reflect))
                .map(|l| l.f(wo, sample.wi))
                .sum();
        }

        sample.wi = wi_world;
        Some(sample)
    }

    pub fn pdf(&self, wo_world: Vec3f, wi_world: Vec3f, flags: BxDFType) -> Float {
        let matching = self.num_components(flags);
        if matching == 0 { return 0.0 }
        let wo = self.world_to_local(wo_world);
        let wi = self.world_to_local(wi_world);
        if wo.z == 0.0 { return 0.0 }

        let pdf: Float = self.lobes.iter()
            .filter(|lobe| lobe.matches_flags(flags))
            .map(|lobe| lobe.pdf(wo, wi))
            .sum();
        pdf / matching as Float
    }
}
